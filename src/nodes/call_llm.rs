//! `call_llm`: the thin graph's only node. A single-node workflow used by
//! `/api/chat` (sync) and as the simplest possible `/api/chat/async` job,
//! grounded on the same message-echo shape the framework's own demos use
//! for their minimal examples.

use async_trait::async_trait;

use crate::message::Message;
use crate::node::{Node, NodeContext, NodeError, NodePartial};
use crate::state::StateSnapshot;

#[derive(Clone, Default)]
pub struct CallLlmNode;

#[async_trait]
impl Node for CallLlmNode {
    async fn run(
        &self,
        snapshot: StateSnapshot,
        ctx: NodeContext,
    ) -> Result<NodePartial, NodeError> {
        ctx.emit_node("call_llm", "responding to the latest message")?;

        let reply = match snapshot.messages.last() {
            Some(msg) => format!("Acknowledged: {}", msg.content),
            None => "No input to respond to.".to_string(),
        };

        Ok(NodePartial::new().with_messages(vec![Message::assistant(&reply)]))
    }
}
