use super::*;

fn outbox() -> (Outbox, mpsc::UnboundedReceiver<ServerMessage>) {
    mpsc::unbounded_channel()
}

async fn registered(registry: &ConnectionRegistry, user_id: &str) -> (ConnectionId, mpsc::UnboundedReceiver<ServerMessage>) {
    let conn_id = Uuid::new_v4();
    let (tx, rx) = outbox();
    registry.register(conn_id, user_id, tx).await;
    (conn_id, rx)
}

fn member_ids(members: &[Member]) -> HashSet<ConnectionId> {
    members.iter().map(|m| m.conn_id).collect()
}

#[tokio::test]
async fn register_starts_with_no_rooms() {
    let registry = ConnectionRegistry::new();
    let (conn, _rx) = registered(&registry, "alice").await;

    assert_eq!(registry.len().await, 1);
    assert!(matches!(
        registry.require_joined(conn, "r1").await,
        Err(RegistryError::NotInRoom(room)) if room == "r1"
    ));
}

#[tokio::test]
async fn join_twice_is_already_in_room() {
    let registry = ConnectionRegistry::new();
    let (conn, _rx) = registered(&registry, "alice").await;

    registry.join_room(conn, "r1").await.unwrap();
    let err = registry.join_room(conn, "r1").await.unwrap_err();

    assert!(matches!(err, RegistryError::AlreadyInRoom(ref room) if room == "r1"));
    assert_eq!(err.error_code(), "E_ALREADY_IN_ROOM");
    assert_eq!(registry.members_of("r1").await.len(), 1);

    registry.leave_room(conn, "r1").await.unwrap();
    assert!(registry.members_of("r1").await.is_empty());
}

#[tokio::test]
async fn leave_unjoined_room_is_not_in_room() {
    let registry = ConnectionRegistry::new();
    let (conn, _rx) = registered(&registry, "alice").await;
    registry.join_room(conn, "r1").await.unwrap();

    let err = registry.leave_room(conn, "r2").await.unwrap_err();

    assert!(matches!(err, RegistryError::NotInRoom(ref room) if room == "r2"));
    assert!(registry.require_joined(conn, "r1").await.is_ok());
}

#[tokio::test]
async fn unknown_connection_cannot_join() {
    let registry = ConnectionRegistry::new();
    let ghost = Uuid::new_v4();

    let err = registry.join_room(ghost, "r1").await.unwrap_err();

    assert!(matches!(err, RegistryError::UnknownConnection(id) if id == ghost));
    assert_eq!(err.error_code(), "E_UNKNOWN_CONNECTION");
}

#[tokio::test]
async fn members_of_filters_by_room() {
    let registry = ConnectionRegistry::new();
    let (a, _ra) = registered(&registry, "alice").await;
    let (b, _rb) = registered(&registry, "bob").await;
    let (c, _rc) = registered(&registry, "carol").await;
    registry.join_room(a, "r1").await.unwrap();
    registry.join_room(b, "r1").await.unwrap();
    registry.join_room(b, "r2").await.unwrap();
    registry.join_room(c, "r2").await.unwrap();

    assert_eq!(member_ids(&registry.members_of("r1").await), HashSet::from([a, b]));
    assert_eq!(member_ids(&registry.members_of("r2").await), HashSet::from([b, c]));
    assert!(registry.members_of("r3").await.is_empty());

    let members = registry.members_of("r1").await;
    let alice = members.iter().find(|m| m.conn_id == a).unwrap();
    assert_eq!(alice.user_id, "alice");
}

#[tokio::test]
async fn unregister_drops_every_membership() {
    let registry = ConnectionRegistry::new();
    let (a, _ra) = registered(&registry, "alice").await;
    let (b, _rb) = registered(&registry, "bob").await;
    registry.join_room(a, "r2").await.unwrap();
    registry.join_room(a, "r1").await.unwrap();
    registry.join_room(b, "r1").await.unwrap();

    let left = registry.unregister(a).await;

    assert_eq!(left, Some(vec!["r1".to_string(), "r2".to_string()]));
    assert_eq!(member_ids(&registry.members_of("r1").await), HashSet::from([b]));
    assert!(registry.members_of("r2").await.is_empty());
    assert_eq!(registry.unregister(a).await, None);
    assert!(!registry.is_empty().await);
}

#[tokio::test]
async fn send_to_reaches_only_target() {
    let registry = ConnectionRegistry::new();
    let (a, mut ra) = registered(&registry, "alice").await;
    let (_b, mut rb) = registered(&registry, "bob").await;

    assert!(registry.send_to(a, ServerMessage::JoinRoomSuccess { room_id: "r1".into() }).await);

    assert_eq!(ra.try_recv().unwrap(), ServerMessage::JoinRoomSuccess { room_id: "r1".into() });
    assert!(rb.try_recv().is_err());
    assert!(!registry.send_to(Uuid::new_v4(), ServerMessage::JoinRoomSuccess { room_id: "r1".into() }).await);
}

#[tokio::test]
async fn member_send_reports_closed_queue() {
    let registry = ConnectionRegistry::new();
    let (a, ra) = registered(&registry, "alice").await;
    registry.join_room(a, "r1").await.unwrap();
    drop(ra);

    let members = registry.members_of("r1").await;

    assert!(!members[0].send(ServerMessage::JoinRoomSuccess { room_id: "r1".into() }));
}

#[tokio::test]
async fn isolated_registries_do_not_share_state() {
    let first = ConnectionRegistry::new();
    let second = ConnectionRegistry::new();
    let (a, _ra) = registered(&first, "alice").await;
    first.join_room(a, "r1").await.unwrap();

    assert!(second.members_of("r1").await.is_empty());
    assert!(second.is_empty().await);
}
