mod common;

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

use hookwise::adapters::http::{EventsHttpClient, EventsHttpConfig, EventsHttpServer, HealthResponse};
use hookwise::domain::models::{ConditionOperator, NewTrigger, TriggerAction, TriggerCondition, TriggerEvent};
use hookwise::domain::ports::TaskCreator;
use hookwise::services::{FieldConditionEvaluator, TriggerEngine};

use common::test_env;

struct RunningListener {
    base_url: String,
    shutdown: oneshot::Sender<()>,
    handle: tokio::task::JoinHandle<std::io::Result<()>>,
}

async fn listen(engine: Arc<TriggerEngine>) -> RunningListener {
    let server = EventsHttpServer::new(
        engine,
        EventsHttpConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
    );
    let socket = server.bind().await.unwrap();
    let addr = socket.local_addr().unwrap();
    let (shutdown, rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(server.serve_with_shutdown(socket, async move {
        let _ = rx.await;
    }));
    RunningListener {
        base_url: format!("http://{addr}"),
        shutdown,
        handle,
    }
}

fn invoice_trigger() -> NewTrigger {
    NewTrigger::new(
        "invoice-inbox",
        "gmail",
        TriggerAction::CreateTask {
            title: "Invoice from {{from}}".to_string(),
            prompt: "Process '{{subject}}'".to_string(),
            workspace_id: None,
        },
    )
    .with_condition(TriggerCondition::new("subject", ConditionOperator::Contains, "invoice"))
}

#[tokio::test]
async fn test_posted_event_fires_running_engine() {
    let env = test_env().await;
    let engine = Arc::new(TriggerEngine::new(
        env.triggers.clone(),
        Arc::new(FieldConditionEvaluator::new()),
        env.ingress.clone(),
    ));
    engine.start().await.unwrap();
    let trigger = engine.add_trigger(invoice_trigger()).await.unwrap();
    let listener = listen(engine.clone()).await;

    let client = EventsHttpClient::new(&listener.base_url, Duration::from_secs(30)).unwrap();
    let fired = client
        .emit(
            &TriggerEvent::new("gmail")
                .with_field("subject", "May invoice")
                .with_field("from", "billing@acme.test"),
        )
        .await
        .unwrap();

    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].trigger_id, trigger.id);
    let task = env.tasks.get_task(fired[0].task_id.as_deref().unwrap()).await.unwrap().unwrap();
    assert_eq!(task.title, "Invoice from billing@acme.test");
    assert_eq!(engine.get_trigger(trigger.id).await.unwrap().fire_count, 1);

    let health: HealthResponse = reqwest::get(format!("{}/health", listener.base_url))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(health.engine_running);
    assert_eq!(health.triggers, 1);

    listener.shutdown.send(()).unwrap();
    listener.handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_listener_rejects_non_object_body_and_stopped_engine() {
    let env = test_env().await;
    let engine = Arc::new(TriggerEngine::new(
        env.triggers.clone(),
        Arc::new(FieldConditionEvaluator::new()),
        env.ingress.clone(),
    ));
    engine.start().await.unwrap();
    let listener = listen(engine.clone()).await;
    let http = reqwest::Client::new();

    let resp = http
        .post(format!("{}/events/gmail", listener.base_url))
        .json(&json!([1, 2]))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);

    engine.stop();
    let client = EventsHttpClient::new(&listener.base_url, Duration::from_secs(30)).unwrap();
    let err = client.emit(&TriggerEvent::new("gmail")).await.unwrap_err();
    assert!(err.to_string().contains("503"));

    listener.shutdown.send(()).unwrap();
    listener.handle.await.unwrap().unwrap();
}
