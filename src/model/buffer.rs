use std::fmt;

/// Handle to a line stored in a [`LinkedTextBuffer`].
///
/// Handles stay valid across edits elsewhere in the buffer. Once the line
/// itself is deleted the handle is dead forever; slots are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LineId(usize);

/// Error type for buffer edits
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BufferError {
    #[error("line {0:?} is not part of the buffer")]
    InvalidAnchor(LineId),
}

#[derive(Debug, Clone)]
struct Node {
    text: String,
    prev: Option<LineId>,
    next: Option<LineId>,
    live: bool,
}

/// An ordered, editable sequence of text lines.
///
/// Each line keeps its own terminator (usually `\n`), so the concatenation of
/// all lines is the original text. Insertion and deletion are O(1) given a
/// handle.
#[derive(Debug, Clone, Default)]
pub struct LinkedTextBuffer {
    nodes: Vec<Node>,
    head: Option<LineId>,
    tail: Option<LineId>,
    len: usize,
}

impl LinkedTextBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a buffer from text, one node per line (terminators kept).
    pub fn from_text(text: &str) -> Self {
        let mut buffer = Self::new();
        for line in text.split_inclusive('\n') {
            buffer.append(line);
        }
        buffer
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn first(&self) -> Option<LineId> {
        self.head
    }

    pub fn last(&self) -> Option<LineId> {
        self.tail
    }

    /// Whether `id` refers to a line currently in the buffer
    pub fn contains(&self, id: LineId) -> bool {
        self.nodes.get(id.0).is_some_and(|n| n.live)
    }

    /// Text of a live line, terminator included
    pub fn get(&self, id: LineId) -> Option<&str> {
        self.node(id).map(|n| n.text.as_str())
    }

    /// Replace the text of a line in place
    pub fn set(&mut self, id: LineId, text: impl Into<String>) -> Result<(), BufferError> {
        self.check(id)?;
        self.nodes[id.0].text = text.into();
        Ok(())
    }

    pub fn next(&self, id: LineId) -> Option<LineId> {
        self.node(id).and_then(|n| n.next)
    }

    pub fn prev(&self, id: LineId) -> Option<LineId> {
        self.node(id).and_then(|n| n.prev)
    }

    /// Add a line at the end of the buffer
    pub fn append(&mut self, text: impl Into<String>) -> LineId {
        let id = self.alloc(text.into(), self.tail, None);
        match self.tail {
            Some(tail) => self.nodes[tail.0].next = Some(id),
            None => self.head = Some(id),
        }
        self.tail = Some(id);
        id
    }

    /// Insert a new line directly after `anchor`
    pub fn insert_after(
        &mut self,
        anchor: LineId,
        text: impl Into<String>,
    ) -> Result<LineId, BufferError> {
        self.check(anchor)?;
        let next = self.nodes[anchor.0].next;
        let id = self.alloc(text.into(), Some(anchor), next);
        self.nodes[anchor.0].next = Some(id);
        match next {
            Some(next) => self.nodes[next.0].prev = Some(id),
            None => self.tail = Some(id),
        }
        Ok(id)
    }

    /// Insert a new line directly before `anchor`
    pub fn insert_before(
        &mut self,
        anchor: LineId,
        text: impl Into<String>,
    ) -> Result<LineId, BufferError> {
        self.check(anchor)?;
        let prev = self.nodes[anchor.0].prev;
        let id = self.alloc(text.into(), prev, Some(anchor));
        self.nodes[anchor.0].prev = Some(id);
        match prev {
            Some(prev) => self.nodes[prev.0].next = Some(id),
            None => self.head = Some(id),
        }
        Ok(id)
    }

    /// Remove a line and relink its neighbours.
    ///
    /// Returns the predecessor of the removed line (`None` if it was first),
    /// so callers can keep inserting at the point of deletion.
    pub fn delete(&mut self, id: LineId) -> Result<Option<LineId>, BufferError> {
        self.check(id)?;
        let Node { prev, next, .. } = self.nodes[id.0];
        match prev {
            Some(p) => self.nodes[p.0].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.nodes[n.0].prev = prev,
            None => self.tail = prev,
        }
        let node = &mut self.nodes[id.0];
        node.live = false;
        node.prev = None;
        node.next = None;
        node.text.clear();
        self.len -= 1;
        Ok(prev)
    }

    /// Iterate over the live lines in order.
    ///
    /// The iterator borrows the buffer, so it cannot be mutated while one is
    /// alive. Call again to restart from the beginning.
    pub fn iter(&self) -> Lines<'_> {
        Lines {
            buffer: self,
            cursor: self.head,
        }
    }

    fn node(&self, id: LineId) -> Option<&Node> {
        self.nodes.get(id.0).filter(|n| n.live)
    }

    fn check(&self, id: LineId) -> Result<(), BufferError> {
        if self.contains(id) {
            Ok(())
        } else {
            Err(BufferError::InvalidAnchor(id))
        }
    }

    fn alloc(&mut self, text: String, prev: Option<LineId>, next: Option<LineId>) -> LineId {
        let id = LineId(self.nodes.len());
        self.nodes.push(Node {
            text,
            prev,
            next,
            live: true,
        });
        self.len += 1;
        id
    }
}

/// Iterator over `(LineId, text)` pairs of a buffer
pub struct Lines<'a> {
    buffer: &'a LinkedTextBuffer,
    cursor: Option<LineId>,
}

impl<'a> Iterator for Lines<'a> {
    type Item = (LineId, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.cursor?;
        let node = &self.buffer.nodes[id.0];
        self.cursor = node.next;
        Some((id, node.text.as_str()))
    }
}

impl fmt::Display for LinkedTextBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (_, text) in self.iter() {
            f.write_str(text)?;
        }
        Ok(())
    }
}
