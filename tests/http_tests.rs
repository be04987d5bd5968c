use std::net::SocketAddr;

use gqlwire::config::ServerConfig;
use gqlwire::demo;
use gqlwire::schema::validate;
use gqlwire::transport::TransportDispatcher;
use serde_json::{Value, json};
use tokio::net::TcpListener;

async fn start_server() -> SocketAddr {
    let schema = validate(demo::DEMO_SDL).into_result().unwrap();
    let dispatcher =
        TransportDispatcher::new(ServerConfig::default(), schema, demo::resolvers()).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(dispatcher.serve_on(listener));
    addr
}

async fn post(addr: SocketAddr, body: Value) -> (u16, Value) {
    let response = reqwest::Client::new()
        .post(format!("http://{}/graphql", addr))
        .json(&body)
        .send()
        .await
        .unwrap();
    let status = response.status().as_u16();
    (status, response.json().await.unwrap())
}

#[tokio::test]
async fn test_query_over_http() {
    let addr = start_server().await;
    let (status, body) = post(addr, json!({ "query": "{ sayHello }" })).await;
    assert_eq!(status, 200);
    assert_eq!(body, json!({ "data": { "sayHello": "Hello" } }));
}

#[tokio::test]
async fn test_mutation_with_variables() {
    let addr = start_server().await;
    let (_, body) = post(
        addr,
        json!({
            "query": "mutation Send($message: String!) { sendMessage(message: $message) }",
            "variables": { "message": "ahoy" },
            "operationName": "Send"
        }),
    )
    .await;
    assert_eq!(body["data"]["sendMessage"], "You said ahoy");
}

#[tokio::test]
async fn test_validation_error_has_location() {
    let addr = start_server().await;
    let (status, body) = post(addr, json!({ "query": "{ sayGoodbye }" })).await;
    assert_eq!(status, 200);
    assert!(body["errors"][0]["message"].is_string());
    assert_eq!(body["errors"][0]["locations"][0]["line"], 1);
}

#[tokio::test]
async fn test_get_request() {
    let addr = start_server().await;
    let body: Value = reqwest::get(format!("http://{}/graphql?query=%7B%20sayHello%20%7D", addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["data"]["sayHello"], "Hello");
}

#[tokio::test]
async fn test_malformed_json_body() {
    let addr = start_server().await;
    let response = reqwest::Client::new()
        .post(format!("http://{}/graphql", addr))
        .header("content-type", "application/json")
        .body("{ not json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
}
