//! Quote-class tree: one node per distinct quoting prefix seen in a message.
//!
//! Prefixes are discovered lazily while lines are classified. A node's prefix
//! is always a prefix of every descendant's prefix; siblings never prefix each
//! other. When a line arrives whose quoting prefix is shorter than an existing
//! node's, a new node is spliced in above it (and above any sibling it also
//! prefixes) and the color indexes of everything at or after the displaced
//! position are shifted by one. Colors already drawn are then stale, which is
//! reported through [`QuoteTree::take_restructured`].
//!
//! Nodes live in an arena and refer to each other by [`QuoteId`], so re-linking
//! during a split is a handful of index writes.

/// Stable handle to a node of a [`QuoteTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QuoteId(usize);

#[derive(Debug, Clone)]
struct QuoteNode {
    prefix: Vec<u8>,
    /// Position in discovery order; selects the palette entry.
    index: usize,
    parent: Option<QuoteId>,
    first_child: Option<QuoteId>,
    next: Option<QuoteId>,
    prev: Option<QuoteId>,
}

/// Hierarchy of quoting prefixes owned by one pager session.
#[derive(Debug, Clone)]
pub struct QuoteTree {
    nodes: Vec<QuoteNode>,
    /// First top-level sibling.
    root: Option<QuoteId>,
    palette_size: usize,
    /// Next free depth index.
    next_index: usize,
    restructured: bool,
}

impl QuoteTree {
    /// Create an empty tree whose nodes cycle through `palette_size` colors.
    pub fn new(palette_size: usize) -> Self {
        Self {
            nodes: Vec::new(),
            root: None,
            palette_size,
            next_index: 0,
            restructured: false,
        }
    }

    /// Number of nodes in the tree.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether no prefix has been classified yet.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of palette entries the colors cycle through.
    pub fn palette_size(&self) -> usize {
        self.palette_size
    }

    /// Drop every node. Called when the session closes or the palette changes.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.root = None;
        self.next_index = 0;
        self.restructured = false;
    }

    /// Return the node for `prefix`, creating or restructuring the tree as needed.
    pub fn classify(&mut self, prefix: &[u8]) -> QuoteId {
        if self.palette_size <= 1 {
            if let Some(root) = self.root {
                return root;
            }
            let id = self.alloc(&[]);
            self.next_index = 1;
            self.root = Some(id);
            return id;
        }

        let length = prefix.len();
        let mut inserted: Option<QuoteId> = None;
        let mut displaced: Option<usize> = None;
        let mut cursor = self.root;

        while let Some(q) = cursor {
            let q_len = self.node(q).prefix.len();
            if length <= q_len {
                if self.node(q).prefix.starts_with(prefix) {
                    if length == q_len {
                        return q;
                    }
                    // A node above `q` is needed. Anything it would prefix can
                    // only live on this level, so never descend from here on.
                    cursor = self.adopt(q, prefix, &mut inserted, &mut displaced);
                } else {
                    cursor = self.node(q).next;
                }
            } else if inserted.is_none() && prefix.starts_with(&self.node(q).prefix) {
                return self.classify_below(q, prefix);
            } else {
                cursor = self.node(q).next;
            }
        }

        let class = match inserted {
            Some(t) => t,
            None => {
                let id = self.alloc(prefix);
                self.assign_next_index(id);
                if let Some(old_root) = self.root {
                    self.node_mut(id).next = Some(old_root);
                    self.node_mut(old_root).prev = Some(id);
                }
                self.root = Some(id);
                id
            }
        };

        if let (Some(t), Some(index)) = (inserted, displaced) {
            self.shift_indexes(t, index);
        }
        class
    }

    /// Continue classification inside the branch rooted at `branch`, whose
    /// prefix is a strict prefix of `prefix`.
    fn classify_below(&mut self, branch: QuoteId, prefix: &[u8]) -> QuoteId {
        let length = prefix.len();
        let mut parent = branch;
        let mut inserted: Option<QuoteId> = None;
        let mut displaced: Option<usize> = None;
        let mut cursor = self.node(branch).first_child;

        while let Some(c) = cursor {
            let c_len = self.node(c).prefix.len();
            if length <= c_len {
                if self.node(c).prefix.starts_with(prefix) {
                    if length == c_len {
                        return c;
                    }
                    cursor = self.adopt(c, prefix, &mut inserted, &mut displaced);
                } else {
                    cursor = self.node(c).next;
                }
            } else if inserted.is_none() && prefix.starts_with(&self.node(c).prefix) {
                parent = c;
                cursor = self.node(c).first_child;
            } else {
                cursor = self.node(c).next;
            }
        }

        match inserted {
            None => {
                let id = self.alloc(prefix);
                if let Some(first) = self.node(parent).first_child {
                    self.node_mut(id).next = Some(first);
                    self.node_mut(first).prev = Some(id);
                }
                self.node_mut(parent).first_child = Some(id);
                self.node_mut(id).parent = Some(parent);
                self.assign_next_index(id);
                id
            }
            Some(t) => {
                if let Some(index) = displaced {
                    self.shift_indexes(t, index);
                }
                t
            }
        }
    }

    /// Put `q` under a node carrying the shorter `prefix`, creating that node
    /// in `q`'s place on first use. Returns the next sibling to examine.
    fn adopt(
        &mut self,
        q: QuoteId,
        prefix: &[u8],
        inserted: &mut Option<QuoteId>,
        displaced: &mut Option<usize>,
    ) -> Option<QuoteId> {
        self.restructured = true;
        *displaced = Some(self.node(q).index);

        match *inserted {
            None => {
                let t = self.alloc(prefix);
                self.replace(q, t);
                self.node_mut(t).first_child = Some(q);
                let node = self.node_mut(q);
                node.parent = Some(t);
                node.next = None;
                node.prev = None;
                *inserted = Some(t);
                self.node(t).next
            }
            Some(t) => {
                let save = self.node(q).next;
                self.unlink(q);
                self.append_child(t, q);
                save
            }
        }
    }

    /// Give `new` the position `old` holds among its siblings.
    fn replace(&mut self, old: QuoteId, new: QuoteId) {
        let (parent, prev, next) = {
            let n = self.node(old);
            (n.parent, n.prev, n.next)
        };
        {
            let n = self.node_mut(new);
            n.parent = parent;
            n.prev = prev;
            n.next = next;
        }
        if let Some(p) = prev {
            self.node_mut(p).next = Some(new);
        }
        if let Some(n) = next {
            self.node_mut(n).prev = Some(new);
        }
        match parent {
            Some(p) if self.node(p).first_child == Some(old) => {
                self.node_mut(p).first_child = Some(new);
            }
            None if self.root == Some(old) => self.root = Some(new),
            _ => {}
        }
    }

    fn unlink(&mut self, id: QuoteId) {
        let (parent, prev, next) = {
            let n = self.node(id);
            (n.parent, n.prev, n.next)
        };
        if let Some(p) = prev {
            self.node_mut(p).next = next;
        }
        if let Some(n) = next {
            self.node_mut(n).prev = prev;
        }
        match parent {
            Some(p) if self.node(p).first_child == Some(id) => {
                self.node_mut(p).first_child = next;
            }
            None if self.root == Some(id) => self.root = next,
            _ => {}
        }
        let node = self.node_mut(id);
        node.parent = None;
        node.prev = None;
        node.next = None;
    }

    /// Link `child` as the last child of `parent`.
    fn append_child(&mut self, parent: QuoteId, child: QuoteId) {
        let mut last = self.node(parent).first_child;
        while let Some(n) = last.and_then(|l| self.node(l).next) {
            last = Some(n);
        }
        match last {
            Some(l) => {
                self.node_mut(l).next = Some(child);
                self.node_mut(child).prev = Some(l);
            }
            None => self.node_mut(parent).first_child = Some(child),
        }
        self.node_mut(child).parent = Some(parent);
    }

    fn alloc(&mut self, prefix: &[u8]) -> QuoteId {
        let id = QuoteId(self.nodes.len());
        self.nodes.push(QuoteNode {
            prefix: prefix.to_vec(),
            index: 0,
            parent: None,
            first_child: None,
            next: None,
            prev: None,
        });
        id
    }

    fn assign_next_index(&mut self, id: QuoteId) {
        self.node_mut(id).index = self.next_index;
        self.next_index += 1;
    }

    /// Insert `new` at depth `index`, pushing every node at or after it down one.
    fn shift_indexes(&mut self, new: QuoteId, index: usize) {
        for (i, node) in self.nodes.iter_mut().enumerate() {
            if i != new.0 && node.index >= index {
                node.index += 1;
            }
        }
        self.node_mut(new).index = index;
        self.next_index += 1;
    }

    fn node(&self, id: QuoteId) -> &QuoteNode {
        &self.nodes[id.0]
    }

    fn node_mut(&mut self, id: QuoteId) -> &mut QuoteNode {
        &mut self.nodes[id.0]
    }

    /// Report (and reset) whether a split invalidated colors already drawn.
    pub fn take_restructured(&mut self) -> bool {
        std::mem::take(&mut self.restructured)
    }

    /// The literal quoting prefix of `id`.
    pub fn prefix(&self, id: QuoteId) -> &[u8] {
        &self.node(id).prefix
    }

    /// Discovery-order depth index of `id`.
    pub fn depth_index(&self, id: QuoteId) -> usize {
        self.node(id).index
    }

    /// Palette slot of `id`: depth index modulo the palette size.
    pub fn color_index(&self, id: QuoteId) -> usize {
        self.node(id).index % self.palette_size.max(1)
    }

    /// Palette slot for the character at byte `column` of a line quoted with `id`.
    ///
    /// Characters inside the quoting prefix take the color of the outermost
    /// level whose prefix still covers them, so nested markers read as bands.
    pub fn color_index_at(&self, id: QuoteId, column: usize) -> usize {
        let mut color = self.color_index(id);
        let mut cursor = Some(id);
        while let Some(c) = cursor {
            if self.node(c).prefix.len() <= column {
                break;
            }
            color = self.color_index(c);
            cursor = self.node(c).parent;
        }
        color
    }

    pub fn parent(&self, id: QuoteId) -> Option<QuoteId> {
        self.node(id).parent
    }

    /// Top-level nodes in sibling order.
    pub fn roots(&self) -> Siblings<'_> {
        Siblings {
            tree: self,
            cursor: self.root,
        }
    }

    /// Direct children of `id` in sibling order.
    pub fn children(&self, id: QuoteId) -> Siblings<'_> {
        Siblings {
            tree: self,
            cursor: self.node(id).first_child,
        }
    }

    /// Whether `ancestor` lies strictly above `id`.
    pub fn is_ancestor(&self, ancestor: QuoteId, id: QuoteId) -> bool {
        let mut cursor = self.parent(id);
        while let Some(c) = cursor {
            if c == ancestor {
                return true;
            }
            cursor = self.parent(c);
        }
        false
    }
}

/// Iterator over a sibling chain.
pub struct Siblings<'a> {
    tree: &'a QuoteTree,
    cursor: Option<QuoteId>,
}

impl Iterator for Siblings<'_> {
    type Item = QuoteId;

    fn next(&mut self) -> Option<QuoteId> {
        let current = self.cursor?;
        self.cursor = self.tree.node(current).next;
        Some(current)
    }
}
