//! The debug target hierarchy.
//!
//! Every addressable entity the backend reports (the connection itself, a
//! process, a process group, a thread) gets an immutable node in a per-session
//! arena. Nodes reference their parent by [`ContextId`], never by pointer, so
//! nodes can be handed across threads freely and ancestor lookup is a plain
//! id walk.

use uuid::Uuid;

/// Identifier of one debug session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        SessionId(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Stable address of a context node inside its session arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(usize);

/// Structural level of a context node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextKind {
    /// The backend connection, root of the hierarchy.
    Connection,
    /// A process known on the target.
    Process,
    /// The group (backend thread-group) a process executes under.
    Container,
    /// A single thread.
    Thread,
}

/// Level-specific data of a context node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextPayload {
    Connection,
    /// Not every backend version reports a pid in every context, hence the
    /// option.
    Process { pid: Option<String> },
    Container { group_id: String },
    Thread { tid: u32 },
}

impl ContextPayload {
    pub fn kind(&self) -> ContextKind {
        match self {
            ContextPayload::Connection => ContextKind::Connection,
            ContextPayload::Process { .. } => ContextKind::Process,
            ContextPayload::Container { .. } => ContextKind::Container,
            ContextPayload::Thread { .. } => ContextKind::Thread,
        }
    }
}

/// One node of the hierarchy. Immutable once created; superseded nodes (a new
/// attach produces a new container) simply stop being referenced.
#[derive(Debug)]
pub struct ContextNode {
    session: SessionId,
    parent: Option<ContextId>,
    payload: ContextPayload,
}

impl ContextNode {
    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn parent(&self) -> Option<ContextId> {
        self.parent
    }

    pub fn payload(&self) -> &ContextPayload {
        &self.payload
    }

    pub fn kind(&self) -> ContextKind {
        self.payload.kind()
    }
}

/// Arena of context nodes for one session.
#[derive(Debug)]
pub struct ContextArena {
    session: SessionId,
    nodes: Vec<ContextNode>,
}

impl ContextArena {
    pub fn new(session: SessionId) -> Self {
        Self {
            session,
            nodes: Vec::new(),
        }
    }

    fn push(&mut self, parent: Option<ContextId>, payload: ContextPayload) -> ContextId {
        let id = ContextId(self.nodes.len());
        self.nodes.push(ContextNode {
            session: self.session,
            parent,
            payload,
        });
        id
    }

    /// Root node for the backend connection.
    pub fn create_connection(&mut self) -> ContextId {
        self.push(None, ContextPayload::Connection)
    }

    /// A process reported on (or typed in for) the given connection.
    pub fn create_process(&mut self, connection: ContextId, pid: Option<String>) -> ContextId {
        debug_assert_eq!(self.kind(connection), ContextKind::Connection);
        self.push(Some(connection), ContextPayload::Process { pid })
    }

    /// The group a process executes under, scoped by the backend group id.
    pub fn create_container(
        &mut self,
        process: ContextId,
        group_id: impl Into<String>,
    ) -> ContextId {
        debug_assert_eq!(self.kind(process), ContextKind::Process);
        self.push(
            Some(process),
            ContextPayload::Container {
                group_id: group_id.into(),
            },
        )
    }

    pub fn create_thread(&mut self, container: ContextId, tid: u32) -> ContextId {
        debug_assert_eq!(self.kind(container), ContextKind::Container);
        self.push(Some(container), ContextPayload::Thread { tid })
    }

    pub fn node(&self, id: ContextId) -> &ContextNode {
        &self.nodes[id.0]
    }

    pub fn kind(&self, id: ContextId) -> ContextKind {
        self.node(id).kind()
    }

    /// Walk the parent chain (starting at `id` itself) until a node of the
    /// requested kind is found.
    pub fn ancestor_of_kind(&self, id: ContextId, kind: ContextKind) -> Option<ContextId> {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let node = self.node(current);
            if node.kind() == kind {
                return Some(current);
            }
            cursor = node.parent();
        }
        None
    }

    /// The pid carried by the nearest process node above (or at) `id`.
    pub fn process_pid(&self, id: ContextId) -> Option<&str> {
        let process = self.ancestor_of_kind(id, ContextKind::Process)?;
        match self.node(process).payload() {
            ContextPayload::Process { pid } => pid.as_deref(),
            _ => unreachable!("ancestor_of_kind returned a non-process node"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arena() -> ContextArena {
        ContextArena::new(SessionId::new())
    }

    #[test]
    fn test_ancestor_lookup_walks_to_the_nearest_node() {
        let mut arena = arena();
        let connection = arena.create_connection();
        let process = arena.create_process(connection, Some("7".to_string()));
        let container = arena.create_container(process, "i1");
        let thread = arena.create_thread(container, 1);

        assert_eq!(
            arena.ancestor_of_kind(thread, ContextKind::Process),
            Some(process)
        );
        assert_eq!(
            arena.ancestor_of_kind(thread, ContextKind::Connection),
            Some(connection)
        );
        assert_eq!(
            arena.ancestor_of_kind(container, ContextKind::Container),
            Some(container),
            "lookup includes the starting node"
        );
        assert_eq!(arena.ancestor_of_kind(connection, ContextKind::Thread), None);
    }

    #[test]
    fn test_process_pid_resolves_through_descendants() {
        let mut arena = arena();
        let connection = arena.create_connection();
        let process = arena.create_process(connection, Some("42".to_string()));
        let container = arena.create_container(process, "i1");
        let thread = arena.create_thread(container, 3);

        assert_eq!(arena.process_pid(thread), Some("42"));
        assert_eq!(arena.process_pid(process), Some("42"));
        assert_eq!(arena.process_pid(connection), None);
    }

    #[test]
    fn test_process_without_pid() {
        let mut arena = arena();
        let connection = arena.create_connection();
        let process = arena.create_process(connection, None);

        assert_eq!(arena.process_pid(process), None);
        assert_eq!(arena.kind(process), ContextKind::Process);
    }
}
