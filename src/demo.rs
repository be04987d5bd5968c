//! The greeting schema served when no SDL file is configured.

use async_graphql::Value;
use futures_util::{StreamExt, stream};

use crate::graphql::ResolverRegistry;

pub const DEMO_SDL: &str = r#"type Query {
  sayHello: String!
}

type Mutation {
  sendMessage(message: String!): String!
}

type Subscription {
  greeting: String!
}
"#;

pub const GREETINGS: [&str; 5] = ["Hi", "Bonjour", "Hola", "Ciao", "Zdravo"];

pub fn resolvers() -> ResolverRegistry {
    ResolverRegistry::new()
        .field("Query", "sayHello", |_| async { Ok(Value::from("Hello")) })
        .field("Mutation", "sendMessage", |args| async move {
            Ok(Value::from(format!("You said {}", args.string_arg("message")?)))
        })
        .stream("Subscription", "greeting", |_| {
            stream::iter(GREETINGS).map(|greeting| Ok(Value::from(greeting)))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphql::Executor;
    use crate::schema::{summarize, validate};

    #[test]
    fn test_demo_sdl_is_valid() {
        let schema = validate(DEMO_SDL).into_result().unwrap();
        let names: Vec<_> = summarize(&schema).into_iter().map(|t| t.type_name).collect();
        assert_eq!(names, ["Query", "Mutation", "Subscription"]);
    }

    #[tokio::test]
    async fn test_demo_resolvers() {
        let schema = validate(DEMO_SDL).into_result().unwrap();
        let executor = Executor::new(&schema, &resolvers()).unwrap();

        let response = executor
            .execute(r#"mutation { sendMessage(message: "hello there") }"#)
            .await;
        assert_eq!(
            response.data.into_json().unwrap(),
            serde_json::json!({ "sendMessage": "You said hello there" })
        );

        let greetings: Vec<_> = executor
            .execute_stream("subscription { greeting }")
            .map(|r| r.data.into_json().unwrap()["greeting"].clone())
            .collect()
            .await;
        assert_eq!(greetings, GREETINGS.map(serde_json::Value::from));
    }
}
