//! Handle lifecycle per execution context.

use std::sync::Arc;

use steadfast_query::{ExecutionContext, QueryClient, QueryKey};

#[test]
fn persistent_handle_is_created_once() {
    let first = QueryClient::acquire(ExecutionContext::Persistent);
    let second = QueryClient::acquire(ExecutionContext::Persistent);

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.context(), ExecutionContext::Persistent);
}

#[test]
fn concurrent_acquire_yields_one_persistent_handle() {
    let handles: Vec<_> = (0..8)
        .map(|_| std::thread::spawn(|| QueryClient::acquire(ExecutionContext::Persistent)))
        .collect();
    let clients: Vec<Arc<QueryClient>> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    for client in &clients[1..] {
        assert!(Arc::ptr_eq(&clients[0], client));
    }
}

#[test]
fn ephemeral_handles_share_nothing() {
    let key = QueryKey::from(["lifecycle", "ephemeral-only"]);
    let first = QueryClient::acquire(ExecutionContext::Ephemeral);
    let second = QueryClient::acquire(ExecutionContext::Ephemeral);
    let persistent = QueryClient::acquire(ExecutionContext::Persistent);

    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(first.context(), ExecutionContext::Ephemeral);

    first.set_data(key.clone(), "request-a".to_string());

    assert_eq!(first.get_data::<String>(&key).as_deref(), Some("request-a"));
    assert_eq!(second.get_data::<String>(&key), None);
    assert_eq!(persistent.get_data::<String>(&key), None);
}

#[test]
fn persistent_entries_are_visible_to_every_caller() {
    let key = QueryKey::from(["lifecycle", "shared"]);
    QueryClient::acquire(ExecutionContext::Persistent).set_data(key.clone(), 5u8);

    let again = QueryClient::acquire(ExecutionContext::Persistent);
    assert_eq!(again.get_data::<u8>(&key), Some(5));
}
