mod common;

use futures::future::join_all;
use hookwise::domain::models::{AgentAction, CreateTaskOptions, TaskStatus};
use hookwise::domain::ports::TaskCreator;

use common::test_env;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_callers_share_one_task() {
    let env = test_env().await;
    let action = AgentAction::new("Summarize the thread").with_title("Summarize");
    let options = CreateTaskOptions::default().with_session_key("hook:thread-42");

    let calls = (0..8).map(|_| {
        let ingress = env.ingress.clone();
        let action = action.clone();
        let options = options.clone();
        tokio::spawn(async move { ingress.create_task_from_agent_action(&action, &options).await })
    });
    let outcomes: Vec<_> = join_all(calls)
        .await
        .into_iter()
        .map(|joined| joined.expect("task panicked").expect("ingress failed"))
        .collect();

    let originals = outcomes.iter().filter(|o| !o.duplicate).count();
    assert_eq!(originals, 1, "exactly one caller creates the task");

    let task_id = &outcomes[0].task_id;
    assert!(outcomes.iter().all(|o| &o.task_id == task_id));
    assert!(outcomes.iter().all(|o| o.workspace_id == outcomes[0].workspace_id));

    let live: Vec<_> = env
        .tasks
        .list(None, 100)
        .await
        .unwrap()
        .into_iter()
        .filter(|t| t.status != TaskStatus::Cancelled)
        .collect();
    assert_eq!(live.len(), 1);
    assert_eq!(&live[0].id, task_id);
}

#[tokio::test]
async fn test_distinct_keys_create_distinct_tasks() {
    let env = test_env().await;
    let action = AgentAction::new("Triage");

    let a = env
        .ingress
        .create_task_from_agent_action(&action, &CreateTaskOptions::default().with_session_key("k1"))
        .await
        .unwrap();
    let b = env
        .ingress
        .create_task_from_agent_action(&action, &CreateTaskOptions::default().with_session_key("k2"))
        .await
        .unwrap();
    assert_ne!(a.task_id, b.task_id);
    assert!(!a.duplicate && !b.duplicate);
}

#[tokio::test]
async fn test_repeat_after_completion_is_duplicate() {
    let env = test_env().await;
    let action = AgentAction::new("Reply to the customer");
    let options = CreateTaskOptions::default().with_session_key("  email:abc  ");

    let first = env.ingress.create_task_from_agent_action(&action, &options).await.unwrap();
    let again = env
        .ingress
        .create_task_from_agent_action(&action, &CreateTaskOptions::default().with_session_key("email:abc"))
        .await
        .unwrap();

    assert!(again.duplicate);
    assert_eq!(again.task_id, first.task_id);
    assert_eq!(again.workspace_id, first.workspace_id);
    assert!(env.tasks.get_task(&first.task_id).await.unwrap().is_some());
}
