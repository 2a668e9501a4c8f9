// crates/datamart-core/tests/paginator.rs
// ============================================================================
// Module: Event Paginator Tests
// Description: State machine scenarios for the events feed drain.
// Purpose: Verify batch emission, retry budget, backoff, and terminal states.
// ============================================================================

//! ## Overview
//! Drives the events paginator through cursor chains, malformed pages,
//! contract drift, and transport failures with a counting sleeper.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

mod common;

use std::time::Duration;

use datamart_core::EventPage;
use datamart_core::FeedEnd;
use datamart_core::GatewayError;
use datamart_core::MemoryEventSink;
use datamart_core::PaginationError;
use datamart_core::PaginationPolicy;
use datamart_core::PaginatorState;
use datamart_core::drain;

use crate::common::CountingSleeper;
use crate::common::ScriptedGateway;
use crate::common::date;
use crate::common::page;

fn malformed() -> Result<EventPage, GatewayError> {
    Err(GatewayError::Decode("missing field `data`".to_string()))
}

// ============================================================================
// SECTION: Normal Completion
// ============================================================================

#[test]
fn three_pages_then_final_page_yield_three_batches_and_done() {
    let gateway = ScriptedGateway::reference().with_pages(vec![
        Ok(page(2, Some("c1"))),
        Ok(page(3, Some("c2"))),
        Ok(page(1, Some("c3"))),
        Ok(page(4, None)),
    ]);
    let sleeper = CountingSleeper::default();
    let sink = MemoryEventSink::new();
    let mut paginator =
        drain(&gateway, date("2024-05-01"), PaginationPolicy::default(), &sleeper, &sink);

    let batches: Vec<_> = paginator.by_ref().map(Result::unwrap).collect();

    assert_eq!(batches.len(), 3);
    assert_eq!(batches.iter().map(|batch| batch.events.len()).sum::<usize>(), 6);
    assert_eq!(paginator.state(), &PaginatorState::Done(FeedEnd::Exhausted));
    assert_eq!(paginator.batches_emitted(), 3);
    assert!(sleeper.waits().is_empty());
    assert_eq!(
        gateway.requested_cursors(),
        vec![None, Some("c1".to_string()), Some("c2".to_string()), Some("c3".to_string())]
    );
    assert!(sink.names().contains(&"events_feed_exhausted"));
    assert!(paginator.next().is_none());
}

#[test]
fn page_without_data_or_cursor_is_logged_as_contract_drift() {
    let gateway = ScriptedGateway::reference()
        .with_pages(vec![Ok(page(1, Some("c1"))), Ok(EventPage::default())]);
    let sleeper = CountingSleeper::default();
    let sink = MemoryEventSink::new();
    let mut paginator =
        drain(&gateway, date("2024-05-01"), PaginationPolicy::default(), &sleeper, &sink);

    assert_eq!(paginator.by_ref().count(), 1);
    assert_eq!(paginator.state(), &PaginatorState::Done(FeedEnd::ContractDrift));
    assert!(sink.names().contains(&"events_contract_drift"));
    assert!(!sink.names().contains(&"events_feed_exhausted"));
}

#[test]
fn malformed_page_is_refetched_with_same_cursor() {
    let gateway = ScriptedGateway::reference().with_pages(vec![
        Ok(page(1, Some("c1"))),
        malformed(),
        Ok(page(1, Some("c2"))),
        Ok(page(0, None)),
    ]);
    let sleeper = CountingSleeper::default();
    let sink = MemoryEventSink::new();
    let policy = PaginationPolicy {
        error_budget: 3,
        backoff: Duration::from_millis(250),
    };
    let mut paginator = drain(&gateway, date("2024-05-01"), policy, &sleeper, &sink);

    assert_eq!(paginator.by_ref().filter(Result::is_ok).count(), 2);
    assert_eq!(paginator.malformed_pages(), 1);
    assert_eq!(sleeper.waits(), vec![Duration::from_millis(250)]);
    assert_eq!(
        gateway.requested_cursors(),
        vec![None, Some("c1".to_string()), Some("c1".to_string()), Some("c2".to_string())]
    );
}

// ============================================================================
// SECTION: Failure
// ============================================================================

#[test]
fn all_malformed_pages_spend_budget_with_backoff_then_fail() {
    let gateway = ScriptedGateway::reference().with_fallback_page(malformed());
    let sleeper = CountingSleeper::default();
    let sink = MemoryEventSink::new();
    let mut paginator =
        drain(&gateway, date("2024-05-01"), PaginationPolicy::default(), &sleeper, &sink);

    let items: Vec<_> = paginator.by_ref().collect();

    assert_eq!(items.len(), 1);
    match &items[0] {
        Err(PaginationError::BudgetExhausted {
            malformed_pages,
            last_error,
        }) => {
            assert_eq!(*malformed_pages, 10);
            assert!(last_error.contains("missing field"));
        }
        other => panic!("unexpected item: {other:?}"),
    }
    assert_eq!(paginator.state(), &PaginatorState::Failed);
    assert_eq!(sleeper.waits(), vec![Duration::from_secs(5); 10]);
    assert_eq!(gateway.requested_cursors().len(), 10);
    let names = sink.names();
    assert_eq!(names.iter().filter(|name| **name == "events_page_malformed").count(), 10);
    assert_eq!(names.last(), Some(&"events_feed_failed"));
}

#[test]
fn budget_is_shared_across_pages() {
    let gateway = ScriptedGateway::reference().with_pages(vec![
        malformed(),
        Ok(page(1, Some("c1"))),
        malformed(),
        Ok(page(1, Some("c2"))),
        malformed(),
    ]);
    let sleeper = CountingSleeper::default();
    let sink = MemoryEventSink::new();
    let policy = PaginationPolicy {
        error_budget: 3,
        backoff: Duration::ZERO,
    };
    let mut paginator = drain(&gateway, date("2024-05-01"), policy, &sleeper, &sink);

    let items: Vec<_> = paginator.by_ref().collect();

    assert_eq!(items.iter().filter(|item| item.is_ok()).count(), 2);
    assert!(matches!(
        items.last(),
        Some(Err(PaginationError::BudgetExhausted {
            malformed_pages: 3,
            ..
        }))
    ));
    assert_eq!(sleeper.waits().len(), 3);
}

#[test]
fn zero_budget_fails_on_first_malformed_page_without_waiting() {
    let gateway = ScriptedGateway::reference().with_fallback_page(malformed());
    let sleeper = CountingSleeper::default();
    let sink = MemoryEventSink::new();
    let policy = PaginationPolicy {
        error_budget: 0,
        backoff: Duration::from_secs(5),
    };
    let mut paginator = drain(&gateway, date("2024-05-01"), policy, &sleeper, &sink);

    let items: Vec<_> = paginator.by_ref().collect();

    assert!(matches!(
        items.as_slice(),
        [Err(PaginationError::BudgetExhausted {
            malformed_pages: 1,
            ..
        })]
    ));
    assert!(sleeper.waits().is_empty());
    assert_eq!(gateway.requested_cursors().len(), 1);
    assert_eq!(paginator.state(), &PaginatorState::Failed);
}

#[test]
fn budget_of_one_allows_one_wait_before_failing() {
    let gateway = ScriptedGateway::reference().with_fallback_page(malformed());
    let sleeper = CountingSleeper::default();
    let sink = MemoryEventSink::new();
    let policy = PaginationPolicy {
        error_budget: 1,
        backoff: Duration::from_secs(5),
    };
    let mut paginator = drain(&gateway, date("2024-05-01"), policy, &sleeper, &sink);

    assert!(matches!(paginator.next(), Some(Err(PaginationError::BudgetExhausted { .. }))));
    assert_eq!(sleeper.waits(), vec![Duration::from_secs(5)]);
    assert_eq!(gateway.requested_cursors().len(), 1);
}

#[test]
fn transport_error_fails_without_retry() {
    let gateway = ScriptedGateway::reference().with_pages(vec![
        Ok(page(1, Some("c1"))),
        Err(GatewayError::Transport("status 503".to_string())),
    ]);
    let sleeper = CountingSleeper::default();
    let sink = MemoryEventSink::new();
    let mut paginator =
        drain(&gateway, date("2024-05-01"), PaginationPolicy::default(), &sleeper, &sink);

    assert!(paginator.next().unwrap().is_ok());
    assert!(matches!(paginator.next(), Some(Err(PaginationError::Transport(_)))));
    assert!(paginator.next().is_none());
    assert_eq!(paginator.state(), &PaginatorState::Failed);
    assert!(sleeper.waits().is_empty());
    assert_eq!(gateway.requested_cursors().len(), 2);
}
