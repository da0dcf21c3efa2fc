//! The sink contract children and the coordinator send through, and the
//! intercepting adapter that sits between them.
//!
//! SPEC_FULL.md "Sub-operation adapter": child operations are written to
//! appear authoritative — they believe they are producing the final reply.
//! [`InterceptingSender`] lets the coordinator sit between a child and the
//! real transport without the child knowing it is nested.

use crate::registry::SentMessageMap;
use crate::types::{MessageId, NodeIndex};

/// A node type a targeted command can be addressed to. Only storage nodes
/// are relevant to this crate; kept as an enum rather than a bare node
/// index to mirror the wire-level `lib::NodeType` distinction the original
/// transport carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Storage,
}

/// Outbound, fire-and-forget command. Replies arrive later via
/// [`MessageSender::receive`]-style callbacks on [`crate::two_phase_update::TwoPhaseUpdateOperation`]
/// (see [`crate::operations`] for the concrete command payloads).
pub trait OutboundMessage {
    fn msg_id(&self) -> MessageId;
}

/// The sink a child operation (or the coordinator itself) sends through.
///
/// Mirrors `DistributorMessageSender` from spec.md §6: `send_command` is
/// fire-and-forget, `send_reply` delivers exactly one client-visible reply,
/// and `send_to_node` targets a single replica directly (used only for the
/// safe path's single full Get and the fast path's repair Get).
pub trait MessageSender<Cmd, Reply> {
    fn send_command(&mut self, cmd: Cmd);
    fn send_reply(&mut self, reply: Reply);
    fn send_to_node(&mut self, node_type: NodeType, node: NodeIndex, cmd: Cmd);

    fn distributor_index(&self) -> u16;
    fn cluster_name(&self) -> &str;
}

/// A child operation as the registry and the intercepting sender see it:
/// erased to the point where only `receive`/`on_close` are needed to drain
/// it. Concrete child operations ([`crate::operations::get::GetOperation`],
/// [`crate::operations::put::PutOperation`],
/// [`crate::operations::update::UpdateOperation`]) implement this once per
/// command/reply pair they accept.
pub trait ChildOperation<Cmd, Reply> {
    /// Feeds a reply to this child. If the child has gathered enough
    /// replies to synthesize its own top-level reply, returns it — the
    /// caller is responsible for forwarding or reinterpreting it.
    fn receive(
        &mut self,
        sink: &mut dyn MessageSender<Cmd, Reply>,
        reply: Reply,
    ) -> Option<Reply>;

    /// Drains this child on external shutdown. Returns a synthesized reply
    /// if draining produced one (SPEC_FULL.md §4.8).
    fn on_close(&mut self, sink: &mut dyn MessageSender<Cmd, Reply>) -> Option<Reply>;
}

/// Intercepts a child operation's [`MessageSender`] calls.
///
/// - `send_command`: recorded in the registry under the command's message
///   id, then forwarded to the outer sender unchanged.
/// - `send_reply`: captured in [`Self::reply`] instead of being forwarded;
///   the parent inspects it after the child's call returns.
/// - Everything else (`send_to_node`, `distributor_index`, `cluster_name`)
///   is delegated to the outer sender unchanged.
///
/// Stack-allocated per dispatch, per SPEC_FULL.md's design note: its
/// lifetime never exceeds the synchronous call that created it.
pub struct InterceptingSender<'a, Cmd, Reply, Child> {
    registry: &'a mut SentMessageMap<Child>,
    /// The child this adapter is interposed for. `None` when draining on
    /// close — no callback is needed once the operation is shutting down.
    callback: Option<Child>,
    outer: &'a mut dyn MessageSender<Cmd, Reply>,
    pub reply: Option<Reply>,
}

impl<'a, Cmd, Reply, Child> InterceptingSender<'a, Cmd, Reply, Child>
where
    Cmd: OutboundMessage,
{
    pub fn new(
        registry: &'a mut SentMessageMap<Child>,
        callback: Child,
        outer: &'a mut dyn MessageSender<Cmd, Reply>,
    ) -> Self {
        Self {
            registry,
            callback: Some(callback),
            outer,
            reply: None,
        }
    }

    /// Builds a draining adapter with no callback — used by `on_close`,
    /// where a reply that arrives can't be routed to anyone further.
    pub fn draining(
        registry: &'a mut SentMessageMap<Child>,
        outer: &'a mut dyn MessageSender<Cmd, Reply>,
    ) -> Self {
        Self {
            registry,
            callback: None,
            outer,
            reply: None,
        }
    }
}

impl<'a, Cmd, Reply, Child> MessageSender<Cmd, Reply> for InterceptingSender<'a, Cmd, Reply, Child>
where
    Cmd: OutboundMessage,
{
    fn send_command(&mut self, cmd: Cmd) {
        if let Some(callback) = self.callback.take() {
            self.registry.insert(cmd.msg_id(), callback);
        }
        self.outer.send_command(cmd);
    }

    fn send_reply(&mut self, reply: Reply) {
        self.reply = Some(reply);
    }

    fn send_to_node(&mut self, node_type: NodeType, node: NodeIndex, cmd: Cmd) {
        self.outer.send_to_node(node_type, node, cmd);
    }

    fn distributor_index(&self) -> u16 {
        self.outer.distributor_index()
    }

    fn cluster_name(&self) -> &str {
        self.outer.cluster_name()
    }
}
