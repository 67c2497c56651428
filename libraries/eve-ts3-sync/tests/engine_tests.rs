//! Registration and connection handling, end to end against fakes.

mod common;

use common::*;
use eve_ts3_core::UserStore;
use eve_ts3_sync::{EngineState, HandleOutcome, SyncError};
use std::time::Duration;

mod registration {
    use super::*;

    #[tokio::test]
    async fn test_register_then_connect_assigns_group() {
        let h = Harness::running().await;

        h.clock.set(0);
        let ttl = h
            .engine
            .create_register_record(character(1, "Pilot1", "ABC", "XYZ"));
        assert_eq!(ttl, 300);

        h.clock.set(100);
        let outcome = h
            .engine
            .handle_notification(client_connected("Pilot1", "uid=", 17))
            .await
            .unwrap();

        let sgid = h.server.group_id("XYZ ABC").expect("group created");
        assert!(matches!(
            outcome,
            HandleOutcome::Assigned { created_group: true, created_user: true, .. }
        ));
        assert_eq!(h.server.member_groups(17), vec![sgid]);
        assert!(h.engine.queue().is_empty());

        let users = h.store.users().await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].eve_char_id, 1);
        assert_eq!(users[0].ts3_uid, "uid=");
        assert_eq!(users[0].ts3_cldbid, cldbid(17));
        assert_eq!(users[0].eve_corp_ticker, "ABC");
        assert_eq!(users[0].eve_alli_ticker, "XYZ");
        assert!(users[0].active);
    }

    #[tokio::test]
    async fn test_expired_registration_changes_nothing() {
        let h = Harness::running().await;

        h.clock.set(0);
        h.engine
            .create_register_record(character(1, "Pilot1", "ABC", "XYZ"));

        h.clock.set(400);
        let outcome = h
            .engine
            .handle_notification(client_connected("Pilot1", "uid=", 17))
            .await
            .unwrap();

        assert_eq!(outcome, HandleOutcome::Expired);
        assert_eq!(h.server.mutation_count(), 0);
        assert!(h.store.users().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ttl_boundary_is_expired() {
        let h = Harness::running().await;

        h.clock.set(1_000);
        h.engine
            .create_register_record(character(1, "Pilot1", "ABC", "XYZ"));

        h.clock.set(1_299);
        assert!(h.engine.queue().take("Pilot1").is_some());

        h.clock.set(1_300);
        let outcome = h
            .engine
            .handle_notification(client_connected("Pilot1", "uid=", 17))
            .await
            .unwrap();
        assert_eq!(outcome, HandleOutcome::Expired);
    }

    #[tokio::test]
    async fn test_reregistration_replaces_record_and_restarts_ttl() {
        let h = Harness::running().await;

        h.clock.set(0);
        h.engine
            .create_register_record(character(1, "Pilot1", "OLD", "XYZ"));

        h.clock.set(250);
        h.engine
            .create_register_record(character(1, "Pilot1", "ABC", "XYZ"));
        assert_eq!(h.engine.queue().len(), 1);

        h.clock.set(400);
        h.engine
            .handle_notification(client_connected("Pilot1", "uid=", 17))
            .await
            .unwrap();

        assert!(h.server.group_id("XYZ ABC").is_some());
        assert!(h.server.group_id("XYZ OLD").is_none());
    }

    #[tokio::test]
    async fn test_unknown_nickname_is_not_pending() {
        let h = Harness::running().await;

        let outcome = h
            .engine
            .handle_notification(client_connected("Stranger", "uid=", 17))
            .await
            .unwrap();

        assert_eq!(outcome, HandleOutcome::NotPending);
        assert_eq!(h.server.mutation_count(), 0);
    }

    #[tokio::test]
    async fn test_moved_client_is_ignored() {
        let h = Harness::running().await;
        h.engine
            .create_register_record(character(1, "Pilot1", "ABC", "XYZ"));

        let outcome = h
            .engine
            .handle_notification(client_entered("Pilot1", "uid=", 17, "1"))
            .await
            .unwrap();

        assert_eq!(outcome, HandleOutcome::Ignored);
        assert_eq!(h.engine.queue().len(), 1);
    }

    #[tokio::test]
    async fn test_registration_is_claimed_once() {
        let h = Harness::running().await;
        h.engine
            .create_register_record(character(1, "Pilot1", "ABC", "XYZ"));

        let first = h
            .engine
            .handle_notification(client_connected("Pilot1", "uid-a=", 17))
            .await
            .unwrap();
        let second = h
            .engine
            .handle_notification(client_connected("Pilot1", "uid-b=", 18))
            .await
            .unwrap();

        assert!(matches!(first, HandleOutcome::Assigned { .. }));
        assert_eq!(second, HandleOutcome::NotPending);
        assert!(h.server.member_groups(18).is_empty());
    }

    #[tokio::test]
    async fn test_existing_group_is_reused() {
        let h = Harness::running().await;
        h.server.add_group(42, "XYZ ABC");
        h.engine
            .create_register_record(character(1, "Pilot1", "ABC", "XYZ"));

        let outcome = h
            .engine
            .handle_notification(client_connected("Pilot1", "uid=", 17))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            HandleOutcome::Assigned {
                sgid: eve_ts3_core::ServerGroupId::new(42),
                created_group: false,
                created_user: true,
            }
        );
        assert!(!h.server.commands().contains(&"servergroupcopy".to_string()));
    }

    #[tokio::test]
    async fn test_concurrent_registrations_create_one_group() {
        let h = Harness::new().await;
        h.connector.set_yielding();
        h.engine.start().await.unwrap();
        h.engine
            .create_register_record(character(1, "Pilot1", "ABC", "XYZ"));
        h.engine
            .create_register_record(character(2, "Pilot2", "ABC", "XYZ"));

        let (first, second) = tokio::join!(
            h.engine
                .handle_notification(client_connected("Pilot1", "uid-a=", 17)),
            h.engine
                .handle_notification(client_connected("Pilot2", "uid-b=", 18)),
        );

        let sgid = h.server.group_id("XYZ ABC").expect("group created");
        assert!(matches!(first.unwrap(), HandleOutcome::Assigned { .. }));
        assert!(matches!(second.unwrap(), HandleOutcome::Assigned { .. }));
        assert_eq!(h.server.member_groups(17), vec![sgid]);
        assert_eq!(h.server.member_groups(18), vec![sgid]);
        let copies = h
            .server
            .commands()
            .iter()
            .filter(|c| c.as_str() == "servergroupcopy")
            .count();
        assert_eq!(copies, 1);
    }

    #[tokio::test]
    async fn test_known_uid_is_updated_not_duplicated() {
        let h = Harness::running().await;

        h.engine
            .create_register_record(character(1, "Pilot1", "ABC", "XYZ"));
        h.engine
            .handle_notification(client_connected("Pilot1", "uid=", 17))
            .await
            .unwrap();

        h.engine
            .create_register_record(character(2, "Pilot2", "DEF", "XYZ"));
        let outcome = h
            .engine
            .handle_notification(client_connected("Pilot2", "uid=", 17))
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            HandleOutcome::Assigned { created_user: false, .. }
        ));
        let users = h.store.users().await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].eve_char_id, 2);
        assert_eq!(users[0].eve_char_name, "Pilot2");
    }

    #[tokio::test]
    async fn test_already_member_is_not_an_error() {
        let h = Harness::running().await;
        h.server.add_group(42, "XYZ ABC");
        h.server.add_member(42, 17);
        h.engine
            .create_register_record(character(1, "Pilot1", "ABC", "XYZ"));

        let outcome = h
            .engine
            .handle_notification(client_connected("Pilot1", "uid=", 17))
            .await;

        assert!(outcome.is_ok());
        assert_eq!(h.store.users().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_assignment_consumes_registration() {
        let h = Harness::running().await;
        h.server.fail_command("servergroupaddclient");
        h.engine
            .create_register_record(character(1, "Pilot1", "ABC", "XYZ"));

        let result = h
            .engine
            .handle_notification(client_connected("Pilot1", "uid=", 17))
            .await;

        assert!(matches!(result, Err(SyncError::Query(_))));
        assert!(h.engine.queue().is_empty());
        assert!(h.store.users().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_notification_is_rejected() {
        let h = Harness::running().await;
        let mut notification = client_connected("Pilot1", "uid=", 17);
        notification.params[0].remove("client_database_id");

        let result = h.engine.handle_notification(notification).await;
        assert!(matches!(result, Err(SyncError::MalformedNotification(_))));
    }

    #[tokio::test]
    async fn test_sweep_drops_only_expired() {
        let h = Harness::new().await;

        h.clock.set(0);
        h.engine
            .create_register_record(character(1, "Old", "ABC", "XYZ"));
        h.clock.set(200);
        h.engine
            .create_register_record(character(2, "New", "ABC", "XYZ"));

        h.clock.set(300);
        assert_eq!(h.engine.sweep_registrations(), 1);
        assert!(h.engine.queue().take("Old").is_none());
        assert!(h.engine.queue().take("New").is_some());
        assert_eq!(h.engine.sweep_registrations(), 0);
    }
}

mod lifecycle {
    use super::*;

    #[tokio::test]
    async fn test_start_logs_in_and_subscribes() {
        let h = Harness::new().await;
        assert_eq!(h.engine.state(), EngineState::Stopped);

        h.engine.start().await.unwrap();

        assert_eq!(h.engine.state(), EngineState::Running);
        assert_eq!(
            h.server.commands(),
            vec!["login", "use", "servernotifyregister"]
        );
        assert!(h.server.has_handler());
    }

    #[tokio::test]
    async fn test_start_twice_is_rejected() {
        let h = Harness::running().await;

        let result = h.engine.start().await;
        assert!(matches!(result, Err(SyncError::InvalidState(_))));
        assert_eq!(h.connector.connects(), 1);
    }

    #[tokio::test]
    async fn test_stop_quits_and_closes() {
        let h = Harness::running().await;

        h.engine.stop().await.unwrap();

        assert_eq!(h.engine.state(), EngineState::Stopped);
        assert_eq!(h.server.commands().last().map(String::as_str), Some("quit"));
        assert!(h.server.is_closed());
    }

    #[tokio::test]
    async fn test_stop_when_stopped_is_rejected() {
        let h = Harness::new().await;
        assert!(matches!(
            h.engine.stop().await,
            Err(SyncError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_restart_after_stop() {
        let h = Harness::running().await;
        h.engine.stop().await.unwrap();
        h.engine.start().await.unwrap();

        assert_eq!(h.engine.state(), EngineState::Running);
        assert_eq!(h.connector.connects(), 2);
    }

    #[tokio::test]
    async fn test_connect_failure_leaves_engine_stopped() {
        let h = Harness::new().await;
        h.connector.refuse();

        let result = h.engine.start().await;

        assert!(matches!(result, Err(SyncError::Query(_))));
        assert_eq!(h.engine.state(), EngineState::Stopped);
    }

    #[tokio::test]
    async fn test_login_failure_closes_session() {
        let h = Harness::new().await;
        h.server.fail_command("login");

        assert!(h.engine.start().await.is_err());
        assert!(h.server.is_closed());
        assert_eq!(h.engine.state(), EngineState::Stopped);
    }

    #[tokio::test]
    async fn test_registrations_survive_stop() {
        let h = Harness::running().await;
        h.engine
            .create_register_record(character(1, "Pilot1", "ABC", "XYZ"));

        h.engine.stop().await.unwrap();
        assert_eq!(h.engine.queue().len(), 1);
    }

    #[tokio::test]
    async fn test_commands_need_a_session() {
        let h = Harness::new().await;
        h.engine
            .create_register_record(character(1, "Pilot1", "ABC", "XYZ"));

        let result = h
            .engine
            .handle_notification(client_connected("Pilot1", "uid=", 17))
            .await;
        assert!(matches!(result, Err(SyncError::NotConnected)));
        assert!(matches!(
            h.engine.keep_alive().await,
            Err(SyncError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_notification_stream_drives_assignment() {
        let h = Harness::running().await;
        h.engine
            .create_register_record(character(1, "Pilot1", "ABC", "XYZ"));

        h.server.emit(client_connected("Pilot1", "uid=", 17));

        let mut assigned = false;
        for _ in 0..100 {
            if !h.store.users().await.unwrap().is_empty() {
                assigned = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert!(assigned, "notification was not processed");
        assert_eq!(h.server.member_groups(17).len(), 1);
    }

    #[tokio::test]
    async fn test_keepalive_sends_version() {
        let h = Harness::running().await;
        h.engine.keep_alive().await.unwrap();
        assert_eq!(h.server.commands().last().map(String::as_str), Some("version"));
    }

    #[tokio::test]
    async fn test_validate_once_uses_its_own_session() {
        let h = Harness::new().await;

        let summary = h.engine.validate_once().await.unwrap();

        assert_eq!(summary.checked, 0);
        assert_eq!(h.engine.state(), EngineState::Stopped);
        assert!(h.server.is_closed());
        assert!(!h.server.has_handler());
    }

    #[tokio::test]
    async fn test_validate_once_refused_while_running() {
        let h = Harness::running().await;

        let result = h.engine.validate_once().await;

        assert!(matches!(result, Err(SyncError::InvalidState(_))));
        assert_eq!(h.engine.state(), EngineState::Running);
        assert!(!h.server.is_closed());
        h.engine.keep_alive().await.unwrap();
    }

    #[tokio::test]
    async fn test_validate_once_racing_start_keeps_live_session() {
        let h = Harness::new().await;
        h.connector.set_yielding();

        let (validated, started) = tokio::join!(h.engine.validate_once(), h.engine.start());

        started.unwrap();
        match validated {
            Ok(_) | Err(SyncError::InvalidState(_)) => {}
            Err(e) => panic!("unexpected validation error: {}", e),
        }
        assert_eq!(h.engine.state(), EngineState::Running);
        assert!(!h.server.is_closed());
        h.engine.keep_alive().await.unwrap();
    }
}
