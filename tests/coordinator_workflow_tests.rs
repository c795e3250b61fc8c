use serde_json::json;
use std::sync::Arc;

use roomcast::{AppError, ChatEvent, EventKind};

mod utils;

use utils::*;

#[tokio::test]
async fn test_first_messages_are_numbered_from_zero() {
    let setup = TestSetupBuilder::new().build().await;
    let alice = setup.coordinator.connect("alice").await.unwrap();
    let general = setup
        .coordinator
        .create_room(&alice.id, "General")
        .await
        .unwrap();
    setup.coordinator.join_room(&alice.id, &general.id).await.unwrap();

    setup
        .coordinator
        .send_message(&alice.id, &general.id, "hi")
        .await
        .unwrap();
    setup
        .coordinator
        .send_message(&alice.id, &general.id, "there")
        .await
        .unwrap();

    let recorded = EventAssertion::recorded_through(&setup, EventKind::MessageReceived, 2).await;
    let messages = recorded.messages_in(&general.id);
    assert_eq!(messages.len(), 2);
    assert_eq!(
        (messages[0].text.as_str(), messages[0].order, &messages[0].sender_id),
        ("hi", 0, &alice.id)
    );
    assert_eq!((messages[1].text.as_str(), messages[1].order), ("there", 1));
}

#[tokio::test]
async fn test_room_names_are_unique_ignoring_case() {
    let setup = TestSetupBuilder::new().with_alice_and_bob().build().await;
    let alice = setup.session("alice").id.clone();
    let bob = setup.session("bob").id.clone();

    setup.coordinator.create_room(&alice, "General").await.unwrap();
    let duplicate = setup.coordinator.create_room(&bob, "general").await;

    assert_eq!(
        duplicate,
        Err(AppError::DuplicateRoomName("general".to_string()))
    );
    assert_eq!(setup.coordinator.list_rooms().await.len(), 1);
    EventAssertion::recorded_through(&setup, EventKind::RoomListChanged, 1)
        .await
        .count(EventKind::RoomCreated, 1);
}

#[tokio::test]
async fn test_hopping_rooms_leaves_then_joins() {
    let setup = TestSetupBuilder::new()
        .with_alice_and_bob()
        .with_rooms(vec!["A", "B"])
        .build()
        .await;
    setup.join("alice", "A").await;
    setup.join("bob", "A").await;
    setup
        .recorder
        .clear_after(EventKind::RoomListChanged, 2)
        .await;

    setup.join("alice", "B").await;

    let recorded = EventAssertion::recorded_through(&setup, EventKind::RoomListChanged, 1)
        .await
        .kinds(vec![
            EventKind::UserLeft,
            EventKind::UserJoined,
            EventKind::RoomListChanged,
        ]);
    match &recorded.events()[0] {
        ChatEvent::UserLeft(left) => assert_eq!(left.room_id, setup.room("A").id),
        other => panic!("expected user-left, got {:?}", other),
    }
    match &recorded.events()[1] {
        ChatEvent::UserJoined(joined) => assert_eq!(joined.room_id, setup.room("B").id),
        other => panic!("expected user-joined, got {:?}", other),
    }

    let members_a = setup.coordinator.members(&setup.room("A").id).await.unwrap();
    assert_eq!(members_a, vec![setup.session("bob").clone()]);
    match &recorded.events()[2] {
        ChatEvent::RoomListChanged(rooms) => {
            let counts: Vec<usize> = rooms.iter().map(|room| room.member_count).collect();
            assert_eq!(counts, vec![1, 1]);
        }
        other => panic!("expected room-list-changed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_non_member_cannot_send() {
    let setup = TestSetupBuilder::new()
        .with_alice_and_bob()
        .with_rooms(vec!["General"])
        .build()
        .await;
    setup.join("alice", "General").await;

    let result = setup
        .coordinator
        .send_message(&setup.session("bob").id, &setup.room("General").id, "hi")
        .await;

    assert!(matches!(result, Err(AppError::NotAMember { .. })));
    EventAssertion::recorded(&setup)
        .await
        .none_of(EventKind::MessageReceived);
}

#[tokio::test]
async fn test_double_disconnect_announces_once() {
    let setup = TestSetupBuilder::new().with_users(vec!["alice"]).build().await;
    let alice = setup.session("alice").id.clone();

    setup.coordinator.disconnect(&alice).await;
    setup.coordinator.disconnect(&alice).await;

    EventAssertion::recorded_through(&setup, EventKind::Disconnect, 1)
        .await
        .kinds(vec![EventKind::Disconnect]);
    assert_eq!(
        setup.coordinator.join_room(&alice, &roomcast::RoomId::from("x")).await,
        Err(AppError::NotConnected(alice.to_string()))
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_join_and_send() {
    let setup = Arc::new(
        TestSetupBuilder::new()
            .with_alice_and_bob()
            .with_rooms(vec!["General"])
            .build()
            .await,
    );

    let tasks = ["alice", "bob"]
        .into_iter()
        .map(|user| {
            let setup = Arc::clone(&setup);
            tokio::spawn(async move {
                setup.join(user, "General").await;
                setup.send(user, "General", &format!("hello from {}", user)).await
            })
        })
        .collect::<Vec<_>>();

    let mut orders: Vec<u64> = futures::future::join_all(tasks)
        .await
        .into_iter()
        .map(|sent| sent.unwrap().order)
        .collect();
    orders.sort_unstable();
    assert_eq!(orders, vec![0, 1]);

    let transcript = setup
        .coordinator
        .transcript(&setup.room("General").id, None, None)
        .await
        .unwrap();
    let mut senders: Vec<&str> = transcript.iter().map(|m| m.text.as_str()).collect();
    senders.sort_unstable();
    assert_eq!(senders, vec!["hello from alice", "hello from bob"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_orders_strictly_increase_under_concurrent_senders() {
    let users = vec!["alice", "bob", "carol", "dave", "erin"];
    let setup = Arc::new(
        TestSetupBuilder::new()
            .with_users(users.clone())
            .with_rooms(vec!["General"])
            .with_transcript_capacity(0)
            .build()
            .await,
    );
    for user in &users {
        setup.join(user, "General").await;
    }

    let tasks = users
        .iter()
        .map(|user| {
            let setup = Arc::clone(&setup);
            let user = user.to_string();
            tokio::spawn(async move {
                for i in 0..40 {
                    setup.send(&user, "General", &format!("{} {}", user, i)).await;
                }
            })
        })
        .collect::<Vec<_>>();
    for task in futures::future::join_all(tasks).await {
        task.unwrap();
    }

    let recorded =
        EventAssertion::recorded_through(&setup, EventKind::MessageReceived, 200).await;
    let orders: Vec<u64> = recorded
        .messages_in(&setup.room("General").id)
        .iter()
        .map(|m| m.order)
        .collect();
    assert_eq!(orders, (0..200).collect::<Vec<u64>>());
}

#[tokio::test]
async fn test_disconnect_while_in_room_cleans_membership() {
    let setup = TestSetupBuilder::new()
        .with_alice_and_bob()
        .with_rooms(vec!["General"])
        .build()
        .await;
    setup.join("alice", "General").await;
    setup.join("bob", "General").await;
    setup
        .recorder
        .clear_after(EventKind::RoomListChanged, 2)
        .await;

    setup.coordinator.disconnect(&setup.session("alice").id).await;

    EventAssertion::recorded_through(&setup, EventKind::Disconnect, 1)
        .await
        .kinds(vec![
            EventKind::UserLeft,
            EventKind::RoomListChanged,
            EventKind::Disconnect,
        ]);
    let general = &setup.coordinator.list_rooms().await[0];
    assert_eq!(general.member_count, 1);
}

#[tokio::test]
async fn test_clients_see_only_their_room() {
    let setup = TestSetupBuilder::new()
        .with_rooms(vec!["General", "Design"])
        .build()
        .await;
    let mut alice = setup.open_client("alice").await;
    let mut bob = setup.open_client("bob").await;
    let mut carol = setup.open_client("carol").await;
    let general = setup.room("General").id.clone();
    let design = setup.room("Design").id.clone();

    setup
        .client_sends(&alice, json!({"type": "join_room", "payload": {"roomId": general}}))
        .await;
    setup
        .client_sends(&bob, json!({"type": "join_room", "payload": {"roomId": general}}))
        .await;
    setup
        .client_sends(&carol, json!({"type": "join_room", "payload": {"roomId": design}}))
        .await;
    FrameAssertion::drain(&mut alice).await;
    FrameAssertion::drain(&mut bob).await;
    FrameAssertion::drain(&mut carol).await;

    setup
        .client_sends(
            &alice,
            json!({"type": "send_message", "payload": {"roomId": general, "text": "hi"}}),
        )
        .await;

    let to_bob = FrameAssertion::until(&mut bob, "message-received").await;
    assert_eq!(to_bob.payload("message-received")["text"], "hi");
    assert_eq!(
        to_bob.payload("message-received")["senderId"],
        alice.session.id.as_str()
    );
    FrameAssertion::until(&mut alice, "message-received")
        .await
        .contains("sent");
    FrameAssertion::drain(&mut carol)
        .await
        .lacks("message-received");
}

#[tokio::test]
async fn test_client_close_announces_departure_to_room() {
    let setup = TestSetupBuilder::new()
        .with_rooms(vec!["General"])
        .build()
        .await;
    let alice = setup.open_client("alice").await;
    let mut bob = setup.open_client("bob").await;
    let general = setup.room("General").id.clone();

    setup
        .client_sends(&alice, json!({"type": "join_room", "payload": {"roomId": general}}))
        .await;
    setup
        .client_sends(&bob, json!({"type": "join_room", "payload": {"roomId": general}}))
        .await;
    FrameAssertion::drain(&mut bob).await;

    roomcast::websockets::ClientLink::close(&setup.coordinator, &alice.session, &alice.handle)
        .await;

    let frames = FrameAssertion::until(&mut bob, "user-left")
        .await
        .lacks("disconnect");
    assert_eq!(
        frames.payload("user-left")["userId"],
        alice.session.id.as_str()
    );
    assert_eq!(
        setup.coordinator.members(&general).await.unwrap(),
        vec![bob.session.clone()]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_disconnect_racing_sends_and_joins_keeps_rooms_consistent() {
    for _ in 0..100 {
        let setup = Arc::new(
            TestSetupBuilder::new()
                .with_alice_and_bob()
                .with_rooms(vec!["A", "B"])
                .with_transcript_capacity(0)
                .build()
                .await,
        );
        setup.join("alice", "A").await;
        setup.join("bob", "A").await;
        let alice = setup.session("alice").id.clone();
        let rooms = vec![setup.room("A").id.clone(), setup.room("B").id.clone()];

        let sender = {
            let (setup, alice, rooms) = (Arc::clone(&setup), alice.clone(), rooms.clone());
            tokio::spawn(async move {
                for i in 0..20 {
                    let room = &rooms[i % 2];
                    match setup.coordinator.send_message(&alice, room, "hi").await {
                        Ok(_)
                        | Err(AppError::NotAMember { .. })
                        | Err(AppError::NotConnected(_)) => {}
                        Err(other) => panic!("send failed with {:?}", other),
                    }
                }
            })
        };
        let joiner = {
            let (setup, alice, rooms) = (Arc::clone(&setup), alice.clone(), rooms.clone());
            tokio::spawn(async move {
                for i in 0..20 {
                    match setup.coordinator.join_room(&alice, &rooms[i % 2]).await {
                        Ok(_) | Err(AppError::NotConnected(_)) => {}
                        Err(other) => panic!("join failed with {:?}", other),
                    }
                }
            })
        };
        let disconnects = (0..2)
            .map(|_| {
                let (setup, alice) = (Arc::clone(&setup), alice.clone());
                tokio::spawn(async move { setup.coordinator.disconnect(&alice).await })
            })
            .collect::<Vec<_>>();

        sender.await.unwrap();
        joiner.await.unwrap();
        for task in futures::future::join_all(disconnects).await {
            task.unwrap();
        }

        assert!(setup.coordinator.session(&alice).await.is_none());
        assert!(setup.coordinator.current_room(&alice).await.is_none());
        for room in setup.coordinator.list_rooms().await {
            let members = setup.coordinator.members(&room.id).await.unwrap();
            assert!(members.iter().all(|member| member.id != alice));
            assert_eq!(room.member_count, members.len());

            let orders: Vec<u64> = setup
                .coordinator
                .transcript(&room.id, None, None)
                .await
                .unwrap()
                .iter()
                .map(|m| m.order)
                .collect();
            assert_eq!(orders, (0..orders.len() as u64).collect::<Vec<u64>>());
        }
    }
}
