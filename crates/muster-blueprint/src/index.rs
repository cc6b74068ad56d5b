//! Compiled blueprint index
//!
//! [`BlueprintIndex::build`] walks the organization tree once, depth-first,
//! expanding every slot into its physical coordinates and registering each
//! under a structured [`Coordinate`] key. The result carries three lookup
//! structures: coordinate → slot context, path → node context, and the
//! capacity index the aggregate computer consumes.
//!
//! The index is built once per engine instance and rebuilt explicitly when
//! the blueprint is reloaded; there is no lazy memoization.

use crate::config::BlueprintConfig;
use crate::coord::Coordinate;
use crate::error::ConfigError;
use crate::node::{nearest, NodePath, OrgNode};
use crate::slot::Slot;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::Arc;

/// A resolved slot: its tree position, effective sheet and layout, and the
/// ordered coordinates it occupies
///
/// Every coordinate of a slot shares one `PoolRef`; single fixed-rank slots
/// are simply pools of capacity one with a fixed rank.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolRef {
    /// Owning node path
    pub path: NodePath,
    /// Slot position within the node (own slots first, then group slots)
    pub slot_index: usize,
    /// Pool title, distinguishing same-rank pools within a node
    pub title: Option<String>,
    /// Fixed rank; occupants hold exactly this rank
    pub fixed_rank: Option<String>,
    /// Eligible ranks for shared pools
    pub eligible_ranks: Vec<String>,
    /// Effective layout name
    pub layout_name: String,
    /// Effective sheet
    pub sheet: String,
    /// Ordered coordinates; declared order is the seniority packing order
    pub coordinates: Vec<Coordinate>,
}

impl PoolRef {
    /// Capacity equals the coordinate count
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.coordinates.len()
    }

    /// Whether occupants share the pool (seniority packing applies)
    ///
    /// Single fixed-rank coordinates are not packed; everything else is.
    #[must_use]
    pub fn is_pool(&self) -> bool {
        self.capacity() > 1 || !self.eligible_ranks.is_empty()
    }

    /// Whether a rank may occupy this pool
    #[must_use]
    pub fn admits(&self, rank: &str) -> bool {
        if let Some(fixed) = &self.fixed_rank {
            return fixed.eq_ignore_ascii_case(rank);
        }
        self.eligible_ranks
            .iter()
            .any(|r| r.eq_ignore_ascii_case(rank))
    }

    /// Key under which this pool's capacity and occupancy are aggregated
    ///
    /// The title when present, else the fixed rank, else the eligible ranks
    /// joined with `/`.
    #[must_use]
    pub fn availability_key(&self) -> String {
        if let Some(title) = &self.title {
            return title.clone();
        }
        if let Some(rank) = &self.fixed_rank {
            return rank.clone();
        }
        self.eligible_ranks.join("/")
    }
}

/// What a single coordinate means organizationally
#[derive(Debug, Clone)]
pub struct SlotContext {
    /// The pool the coordinate belongs to
    pub pool: Arc<PoolRef>,
    /// Position of the coordinate within the pool's declared order
    pub coord_index: usize,
}

/// A node's resolved view
#[derive(Debug, Clone)]
pub struct NodeContext {
    /// Full path from root
    pub path: NodePath,
    /// Short identifiers resolving to this node
    pub shortcuts: Vec<String>,
    /// Effective sheet, when resolvable
    pub sheet: Option<String>,
    /// Pools owned by this node, in declaration order
    pub pools: Vec<Arc<PoolRef>>,
}

/// Per-path slot capacity, keyed by pool availability key
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathCapacity {
    /// Total coordinates per availability key
    pub totals: IndexMap<String, usize>,
}

/// Compiled lookup structures over one blueprint
#[derive(Debug)]
pub struct BlueprintIndex {
    by_coordinate: HashMap<Coordinate, SlotContext>,
    by_path: IndexMap<NodePath, NodeContext>,
    pools: Vec<Arc<PoolRef>>,
    capacity: IndexMap<NodePath, PathCapacity>,
}

impl BlueprintIndex {
    /// Compile the blueprint's organization tree
    ///
    /// # Errors
    /// Any unresolved layout/sheet/group reference or malformed slot
    /// placement is a [`ConfigError`]; nothing is silently skipped.
    pub fn build(config: &BlueprintConfig) -> Result<Self, ConfigError> {
        let mut builder = IndexBuilder {
            config,
            by_coordinate: HashMap::new(),
            by_path: IndexMap::new(),
            pools: Vec::new(),
            capacity: IndexMap::new(),
        };
        let mut stack: Vec<&OrgNode> = Vec::new();
        for root in &config.hierarchy {
            builder.visit(root, &NodePath::root(), &mut stack)?;
        }
        Ok(Self {
            by_coordinate: builder.by_coordinate,
            by_path: builder.by_path,
            pools: builder.pools,
            capacity: builder.capacity,
        })
    }

    /// Context for a coordinate, if any slot occupies it
    #[must_use]
    pub fn context_at(&self, coord: &Coordinate) -> Option<&SlotContext> {
        self.by_coordinate.get(coord)
    }

    /// Node context by exact path
    #[must_use]
    pub fn node(&self, path: &NodePath) -> Option<&NodeContext> {
        self.by_path.get(path)
    }

    /// Find a node by leaf name, shortcut, or full dotted path
    #[must_use]
    pub fn find_node(&self, query: &str) -> Option<&NodeContext> {
        let query = query.trim();
        self.by_path.values().find(|ctx| {
            ctx.path.leaf().is_some_and(|n| n.eq_ignore_ascii_case(query))
                || ctx
                    .shortcuts
                    .iter()
                    .any(|s| s.eq_ignore_ascii_case(query))
                || ctx.path.to_string().eq_ignore_ascii_case(query)
        })
    }

    /// All pools in depth-first declaration order
    #[must_use]
    pub fn pools(&self) -> &[Arc<PoolRef>] {
        &self.pools
    }

    /// Unique sheet names the blueprint touches, in first-seen order
    #[must_use]
    pub fn sheets(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for pool in &self.pools {
            if !seen.contains(&pool.sheet) {
                seen.push(pool.sheet.clone());
            }
        }
        seen
    }

    /// Capacity index: per path, totals per availability key
    #[must_use]
    pub fn capacity(&self) -> &IndexMap<NodePath, PathCapacity> {
        &self.capacity
    }

    /// Nodes in depth-first order
    pub fn nodes(&self) -> impl Iterator<Item = &NodeContext> {
        self.by_path.values()
    }
}

struct IndexBuilder<'a> {
    config: &'a BlueprintConfig,
    by_coordinate: HashMap<Coordinate, SlotContext>,
    by_path: IndexMap<NodePath, NodeContext>,
    pools: Vec<Arc<PoolRef>>,
    capacity: IndexMap<NodePath, PathCapacity>,
}

impl<'a> IndexBuilder<'a> {
    fn visit(
        &mut self,
        node: &'a OrgNode,
        parent_path: &NodePath,
        stack: &mut Vec<&'a OrgNode>,
    ) -> Result<(), ConfigError> {
        stack.push(node);
        let path = parent_path.child(&node.name);

        let effective_sheet = nearest(stack, |n| n.sheet_name.as_deref());

        // Own slots first, then the referenced reusable group, preserving
        // declaration order across both.
        let mut slots: Vec<&Slot> = node.slots.iter().collect();
        if let Some(group) = &node.use_slots_from {
            slots.extend(self.config.slot_group(group)?);
        }

        let mut node_pools = Vec::with_capacity(slots.len());
        for (slot_index, slot) in slots.into_iter().enumerate() {
            let pool = self.resolve_slot(slot, slot_index, &path, effective_sheet, stack)?;
            node_pools.push(pool);
        }

        for pool in &node_pools {
            let entry = self.capacity.entry(path.clone()).or_default();
            *entry
                .totals
                .entry(pool.availability_key())
                .or_insert(0) += pool.capacity();
        }

        self.by_path.insert(
            path.clone(),
            NodeContext {
                path: path.clone(),
                shortcuts: node.shortcuts.clone(),
                sheet: effective_sheet.map(str::to_string),
                pools: node_pools,
            },
        );

        for child in &node.children {
            self.visit(child, &path, stack)?;
        }
        stack.pop();
        Ok(())
    }

    fn resolve_slot(
        &mut self,
        slot: &Slot,
        slot_index: usize,
        path: &NodePath,
        effective_sheet: Option<&str>,
        stack: &[&'a OrgNode],
    ) -> Result<Arc<PoolRef>, ConfigError> {
        let path_str = path.to_string();
        let (layout_name, _) = self
            .config
            .resolve_layout(slot, stack, &path_str, slot_index)?;

        let sheet = slot
            .location
            .sheet_name
            .as_deref()
            .or(effective_sheet)
            .ok_or_else(|| ConfigError::SheetUnresolved {
                path: path_str.clone(),
            })?;

        let default_col = slot
            .location
            .col
            .or_else(|| nearest(stack, |n| n.location.as_ref()).and_then(|l| l.start_col));
        let coordinates = slot.expand(sheet, default_col, &path_str, slot_index)?;

        let pool = Arc::new(PoolRef {
            path: path.clone(),
            slot_index,
            title: slot.title.clone(),
            fixed_rank: slot.rank.clone(),
            eligible_ranks: slot.ranks.clone(),
            layout_name: layout_name.to_string(),
            sheet: sheet.to_string(),
            coordinates,
        });

        for (coord_index, coord) in pool.coordinates.iter().enumerate() {
            let previous = self.by_coordinate.insert(
                coord.clone(),
                SlotContext {
                    pool: Arc::clone(&pool),
                    coord_index,
                },
            );
            if previous.is_some() {
                return Err(ConfigError::DuplicateCoordinate(coord.clone()));
            }
        }

        self.pools.push(Arc::clone(&pool));
        Ok(pool)
    }
}
