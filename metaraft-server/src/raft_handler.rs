use crate::cluster_node::ClusterNode;
use crate::protocol::{Request, Response};

/// Routes one decoded request to the node. Requests are expected to have
/// passed [`Request::validate`].
pub async fn handle_request(node: &ClusterNode, request: Request) -> Response {
    match request {
        // ============ RAFT RPCs ============
        Request::RequestVote(req) => Response::RequestVote(node.handle_request_vote(&req)),
        Request::AppendEntries(req) => Response::AppendEntries(node.handle_append_entries(&req)),

        // ============ CLIENT REQUESTS ============
        Request::ClientPut { key, value } => match node.client_put(key, value).await {
            Ok(result) => Response::ClientPut { result },
            Err(e) => Response::error(e),
        },
        Request::ClientDelete { key } => match node.client_delete(key).await {
            Ok(result) => Response::ClientDelete { result },
            Err(e) => Response::error(e),
        },
        Request::ClientGet { key } => Response::ClientGet {
            value: node.client_get(&key),
        },
        Request::Status => Response::Status(node.status()),
    }
}

