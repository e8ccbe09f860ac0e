use metaraft_core::{AppendEntriesRequest, ClientPutResult, LogEntry, NodeState, NodeStatus, RequestVoteRequest};
use metaraft_server::protocol::{parse_json, parse_text, render_text, validate_key, Request, Response};
use metaraft_server::ProtocolError;

// ==================== Text Protocol Tests ====================

#[test]
fn test_parse_put_command() {
    match parse_text("PUT /docs/a.txt node1,node2\n").unwrap() {
        Request::ClientPut { key, value } => {
            assert_eq!(key, "/docs/a.txt");
            assert_eq!(value, "node1,node2");
        }
        other => panic!("Expected ClientPut, got {other:?}"),
    }
}

#[test]
fn test_parse_put_value_with_spaces() {
    let request = parse_text("PUT greeting hello big world\r\n").unwrap();
    assert_eq!(
        request,
        Request::ClientPut {
            key: "greeting".to_string(),
            value: "hello big world".to_string()
        }
    );
}

#[test]
fn test_parse_get_and_delete() {
    assert_eq!(parse_text("GET mykey").unwrap(), Request::ClientGet { key: "mykey".to_string() });
    assert_eq!(parse_text("DELETE mykey").unwrap(), Request::ClientDelete { key: "mykey".to_string() });
    assert_eq!(parse_text("STATUS").unwrap(), Request::Status);
}

#[test]
fn test_parse_case_insensitive() {
    assert!(parse_text("put key value").is_ok());
    assert!(parse_text("PuT key value").is_ok());
    assert!(parse_text("get key").is_ok());
    assert!(parse_text("status").is_ok());
}

#[test]
fn test_parse_leading_whitespace() {
    assert_eq!(parse_text("   GET key  \n").unwrap(), Request::ClientGet { key: "key".to_string() });
}

#[test]
fn test_parse_errors() {
    assert!(matches!(parse_text(""), Err(ProtocolError::Empty)));
    assert!(matches!(parse_text("   \n"), Err(ProtocolError::Empty)));
    assert!(matches!(parse_text("PUT onlykey"), Err(ProtocolError::Usage(_))));
    assert!(matches!(parse_text("GET"), Err(ProtocolError::Usage(_))));
    assert!(matches!(parse_text("GET a b"), Err(ProtocolError::Usage(_))));
    assert!(matches!(parse_text("STATUS now"), Err(ProtocolError::Usage(_))));
    assert!(matches!(parse_text("SET k v"), Err(ProtocolError::UnknownCommand(op)) if op == "SET"));
}

#[test]
fn test_key_validation() {
    assert!(validate_key("/a/b.txt").is_ok());
    assert!(matches!(validate_key(""), Err(ProtocolError::InvalidKey(_))));
    assert!(matches!(validate_key("a\tb"), Err(ProtocolError::InvalidKey(_))));
}

// ==================== JSON Protocol Tests ====================

#[test]
fn test_client_put_json_shape() {
    let request = Request::ClientPut {
        key: "x".to_string(),
        value: "1".to_string(),
    };
    let json = serde_json::to_value(&request).unwrap();
    assert_eq!(json, serde_json::json!({"type": "ClientPut", "key": "x", "value": "1"}));
}

#[test]
fn test_put_result_encodes_as_plain_string() {
    let response = Response::ClientPut {
        result: ClientPutResult::NotLeader("127.0.0.1:8002".to_string()),
    };
    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(json["result"], "NOT_LEADER:127.0.0.1:8002");

    let decoded: Response = serde_json::from_value(json).unwrap();
    assert_eq!(decoded, response);
}

#[test]
fn test_raft_rpcs_roundtrip() {
    let vote = Request::RequestVote(RequestVoteRequest::new(3, "n1".to_string(), 7, 2));
    let line = serde_json::to_string(&vote).unwrap();
    assert_eq!(parse_json(&line).unwrap(), vote);

    let append = Request::AppendEntries(AppendEntriesRequest {
        term: 3,
        leader_id: "n1".to_string(),
        prev_log_index: 6,
        prev_log_term: 2,
        entries: vec![LogEntry::new(3, "PUT k v")],
        leader_commit: 5,
    });
    let line = serde_json::to_string(&append).unwrap();
    assert_eq!(parse_json(&line).unwrap(), append);
}

#[test]
fn test_parse_json_rejects_bad_input() {
    assert!(matches!(parse_json("{not json"), Err(ProtocolError::Json(_))));
    assert!(matches!(
        parse_json(r#"{"type":"ClientGet","key":"has space"}"#),
        Err(ProtocolError::InvalidKey(_))
    ));
}

// ==================== Text Rendering Tests ====================

#[test]
fn test_render_text() {
    assert_eq!(render_text(&Response::ClientPut { result: ClientPutResult::Ok }), "OK");
    assert_eq!(
        render_text(&Response::ClientDelete {
            result: ClientPutResult::InProgress
        }),
        "IN_PROGRESS"
    );
    assert_eq!(render_text(&Response::ClientGet { value: String::new() }), "");
    assert_eq!(render_text(&Response::error(ProtocolError::Empty)), "ERROR: empty command");
}

#[test]
fn test_render_status() {
    let status = NodeStatus {
        id: "n1".to_string(),
        state: NodeState::Leader,
        term: 4,
        leader: Some("n1".to_string()),
        commit_index: 9,
        last_applied: 9,
        log_len: 10,
    };
    assert_eq!(
        render_text(&Response::Status(status)),
        "node=n1 state=Leader term=4 leader=n1 commit_index=9 last_applied=9 log_len=10"
    );
}
