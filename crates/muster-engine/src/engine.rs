//! Mutation orchestrator
//!
//! [`RosterEngine`] owns the blueprint, its compiled index, the collaborator
//! handles, and both cache tiers. Read-side queries never take the lease and
//! serve from caches. Every mutation follows one shape: acquire the
//! whole-store lease, verify the target record's identity cell when one
//! exists, re-scan the roster fresh under the lease, compute a full
//! re-layout, commit a single write batch, invalidate both cache tiers, and
//! recompute the derived view before releasing.

use crate::aggregate::{AggregateCache, AvailabilityMap, RosterView};
use crate::allocator::{self, PoolChange};
use crate::delta::MutationDelta;
use crate::error::{EngineError, OperationOutcome};
use crate::guard;
use crate::materialize::{field_writes, materialize};
use crate::person::{LeaveDetails, Person};
use crate::validate;
use chrono::NaiveDate;
use indexmap::IndexMap;
use muster_blueprint::{
    BlueprintConfig, BlueprintIndex, Coordinate, FieldKey, Layout, NodeContext, PoolRef,
};
use muster_grid::{
    CacheService, CellWrite, EnsureReport, GridStore, LeaseService, LeaseToken, SheetCache,
    SheetCacheConfig,
};
use std::sync::Arc;
use std::time::Duration;

/// Inputs for the recruit operation
#[derive(Debug, Clone)]
pub struct RecruitRequest {
    /// Destination node: leaf name, shortcut, or full dotted path
    pub destination: String,
    /// Pool title filter within the node, when the node has titled pools
    pub title: Option<String>,
    /// New identity
    pub identity: String,
    /// Rank name; must admit into the chosen pool
    pub rank: String,
    /// Join date
    pub join_date: Option<NaiveDate>,
    /// Region / locale
    pub region: Option<String>,
    /// External contact identifier
    pub contact_id: Option<String>,
    /// Email address
    pub email: Option<String>,
}

/// Inputs for the reassign operation
#[derive(Debug, Clone)]
pub struct ReassignRequest {
    /// Identity of the record to move
    pub identity: String,
    /// Destination node: leaf name, shortcut, or full dotted path
    pub destination: String,
    /// Pool title filter within the destination node
    pub title: Option<String>,
    /// New rank, for promotion alongside the move; `None` keeps the current
    pub rank: Option<String>,
    /// Explicit override of the training gate
    pub acknowledge_training: bool,
}

/// Field changes for the field-edit operation; `None` leaves a field as-is
#[derive(Debug, Clone, Default)]
pub struct FieldUpdates {
    /// Region / locale
    pub region: Option<String>,
    /// External contact identifier
    pub contact_id: Option<String>,
    /// Email address
    pub email: Option<String>,
    /// Leave-of-absence flag
    pub on_leave: Option<bool>,
    /// Leave details written to the leave-flag annotation
    pub leave: Option<LeaveDetails>,
    /// Training-passed flag
    pub training_passed: Option<bool>,
    /// Custom-field values; keys must be declared in the blueprint
    pub custom: IndexMap<String, String>,
}

/// The engine: blueprint, compiled index, collaborators, cache tiers
pub struct RosterEngine {
    config: BlueprintConfig,
    index: BlueprintIndex,
    store: Arc<dyn GridStore>,
    sheets: SheetCache,
    lease: Arc<dyn LeaseService>,
    aggregates: AggregateCache,
}

impl RosterEngine {
    /// Build an engine over the given collaborators
    ///
    /// Compiles the blueprint index eagerly; a blueprint that does not
    /// compile never produces an engine.
    ///
    /// # Errors
    /// [`EngineError::Configuration`] on any unresolved blueprint reference.
    pub fn new(
        config: BlueprintConfig,
        store: Arc<dyn GridStore>,
        cache: Arc<dyn CacheService>,
        lease: Arc<dyn LeaseService>,
    ) -> Result<Self, EngineError> {
        let index = BlueprintIndex::build(&config)?;
        let sheets = SheetCache::new(
            Arc::clone(&store),
            cache,
            SheetCacheConfig {
                key_prefix: config.cache.sheet_prefix.clone(),
                ttl: Duration::from_secs(config.cache.sheet_ttl_secs),
                compress_threshold: config.cache.compress_threshold_bytes,
            },
        );
        let aggregates = AggregateCache::new(
            config.cache.roster_key.clone(),
            Duration::from_secs(config.cache.aggregate_ttl_secs),
        );
        Ok(Self {
            config,
            index,
            store,
            sheets,
            lease,
            aggregates,
        })
    }

    /// Replace the blueprint and rebuild the index
    ///
    /// # Errors
    /// [`EngineError::Configuration`] when the new blueprint does not
    /// compile; the old one stays active in that case.
    pub async fn reload(&mut self, config: BlueprintConfig) -> Result<(), EngineError> {
        let index = BlueprintIndex::build(&config)?;
        let old_sheets = self.index.sheets();
        self.index = index;
        self.config = config;
        self.aggregates.invalidate();
        self.sheets.invalidate(&old_sheets).await?;
        tracing::info!("blueprint reloaded");
        Ok(())
    }

    /// The active blueprint
    #[inline]
    #[must_use]
    pub fn config(&self) -> &BlueprintConfig {
        &self.config
    }

    /// The compiled index
    #[inline]
    #[must_use]
    pub fn index(&self) -> &BlueprintIndex {
        &self.index
    }

    /// Pre-warm the sheet cache for every blueprint sheet
    ///
    /// # Errors
    /// Raw-grid read failures; persistence problems degrade into the report.
    pub async fn refresh_sheets(&self) -> Result<EnsureReport, EngineError> {
        Ok(self.sheets.ensure(&self.index.sheets()).await?)
    }

    /// The derived roster view, served from the aggregate cache
    ///
    /// # Errors
    /// Propagates scan failures; nothing is cached on error.
    pub async fn roster(&self) -> Result<Arc<RosterView>, EngineError> {
        self.aggregates
            .get_or_insert_with(|| self.scan_roster())
            .await
    }

    /// Current availability per path
    ///
    /// # Errors
    /// Propagates scan failures.
    pub async fn availability(&self) -> Result<AvailabilityMap, EngineError> {
        Ok(self.roster().await?.availability.clone())
    }

    /// Look a record up by identity
    ///
    /// # Errors
    /// Propagates scan failures; an absent identity is `Ok(None)`.
    pub async fn find_by_identity(&self, identity: &str) -> Result<Option<Person>, EngineError> {
        Ok(self.roster().await?.find_identity(identity).cloned())
    }

    /// Recruit a new person into a node, folded to the uniform boundary
    pub async fn recruit(&self, req: RecruitRequest) -> OperationOutcome {
        OperationOutcome::from_result("recruit", self.try_recruit(req).await)
    }

    /// Move (and optionally promote) an existing person
    pub async fn reassign(&self, req: ReassignRequest) -> OperationOutcome {
        OperationOutcome::from_result("reassign", self.try_reassign(req).await)
    }

    /// Remove a person from the roster
    pub async fn remove(&self, identity: &str) -> OperationOutcome {
        OperationOutcome::from_result("remove", self.try_remove(identity).await)
    }

    /// Edit a person's non-positional fields
    pub async fn edit_fields(&self, identity: &str, updates: FieldUpdates) -> OperationOutcome {
        OperationOutcome::from_result("edit_fields", self.try_edit_fields(identity, updates).await)
    }

    /// Recruit, returning the structured result
    ///
    /// # Errors
    /// `Validation` for rule violations and duplicates, `Capacity` when the
    /// chosen pool is full, `Busy` when the lease is contended, plus grid
    /// faults.
    pub async fn try_recruit(&self, req: RecruitRequest) -> Result<MutationDelta, EngineError> {
        tracing::info!(identity = %req.identity, destination = %req.destination, "recruit");
        validate::check_identity(&req.identity, &self.config.validation.username)?;
        if self.config.ranks.by_name(&req.rank).is_none() {
            return Err(EngineError::Validation(format!(
                "unknown rank '{}'",
                req.rank
            )));
        }
        validate::check_email(&self.config, &req.rank, req.email.as_deref())?;
        let view = self.roster().await?;
        validate::check_unique(&view, &req.identity, req.contact_id.as_deref(), None)?;
        drop(view);

        let token = self.acquire().await?;
        let result = self.recruit_locked(&req).await;
        self.release(token).await;
        result
    }

    async fn recruit_locked(&self, req: &RecruitRequest) -> Result<MutationDelta, EngineError> {
        let fresh = self.fresh_view().await?;
        validate::check_unique(&fresh, &req.identity, req.contact_id.as_deref(), None)?;

        let node = self.resolve_node(&req.destination)?;
        let pool = self.select_pool(node, &req.rank, req.title.as_deref(), &fresh, None)?;
        let layout = self.layout_for(&pool)?;
        let occupants = occupants_of(&self.index, &fresh, &pool);

        let recruit = Person {
            identity: req.identity.trim().to_string(),
            rank: req.rank.clone(),
            path: pool.path.clone(),
            display_location: Person::location_label(&pool.path, pool.title.as_deref()),
            source: pool
                .coordinates
                .first()
                .cloned()
                .ok_or_else(|| EngineError::Capacity {
                    pool: Person::location_label(&pool.path, pool.title.as_deref()),
                    capacity: 0,
                })?,
            join_date: req.join_date,
            region: req.region.clone(),
            contact_id: req.contact_id.clone(),
            email: req.email.clone(),
            on_leave: false,
            leave: None,
            training_passed: false,
            custom: IndexMap::new(),
            title: pool.title.clone(),
        };

        let plan = allocator::plan(
            &pool,
            layout,
            &self.config.ranks,
            &self.config.chrono_date_format(),
            &occupants,
            PoolChange::Insert(recruit),
        )?;
        self.commit(&plan.writes, &[pool.sheet.clone()]).await?;
        let after = self.reprime().await?;

        let identity = req.identity.trim();
        let created = plan
            .assignments
            .iter()
            .filter(|p| p.identity.eq_ignore_ascii_case(identity))
            .cloned()
            .collect();
        let updated = plan.moved(&occupants);
        Ok(MutationDelta {
            updated,
            created,
            deleted: None,
            availability: after.availability.clone(),
        })
    }

    /// Reassign, returning the structured result
    ///
    /// # Errors
    /// `NotFound` for an unknown identity or destination, `Conflict` when
    /// the record changed under the client, `Capacity`, `Busy`, `Validation`
    /// for gate violations, plus grid faults.
    pub async fn try_reassign(&self, req: ReassignRequest) -> Result<MutationDelta, EngineError> {
        tracing::info!(identity = %req.identity, destination = %req.destination, "reassign");
        let view = self.roster().await?;
        let person = view
            .find_identity(&req.identity)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("'{}'", req.identity)))?;
        drop(view);

        let target_rank = match &req.rank {
            Some(rank) => {
                if self.config.ranks.by_name(rank).is_none() {
                    return Err(EngineError::Validation(format!("unknown rank '{rank}'")));
                }
                rank.clone()
            }
            None => person.rank.clone(),
        };
        validate::check_training(
            &self.config,
            &target_rank,
            person.training_passed,
            req.acknowledge_training,
        )?;
        validate::check_email(&self.config, &target_rank, person.email.as_deref())?;

        let token = self.acquire().await?;
        let result = self.reassign_locked(&req, &person, &target_rank).await;
        self.release(token).await;
        result
    }

    async fn reassign_locked(
        &self,
        req: &ReassignRequest,
        cached: &Person,
        target_rank: &str,
    ) -> Result<MutationDelta, EngineError> {
        let source_pool = self.pool_at(&cached.source)?;
        let source_layout = self.layout_for(&source_pool)?;
        self.verify(source_layout, cached).await?;

        let fresh = self.fresh_view().await?;
        let mut person = fresh
            .find_source(&cached.source)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("'{}'", req.identity)))?;
        person.rank = target_rank.to_string();

        let node = self.resolve_node(&req.destination)?;
        let dest_pool = self.select_pool(
            node,
            target_rank,
            req.title.as_deref(),
            &fresh,
            Some(&source_pool),
        )?;
        let date_format = self.config.chrono_date_format();

        let (writes, assignments, touched) = if Arc::ptr_eq(&dest_pool, &source_pool) {
            // In-place: promotion or explicit re-sort within the same pool.
            let occupants: Vec<Person> = occupants_of(&self.index, &fresh, &source_pool)
                .into_iter()
                .map(|p| {
                    if p.source == cached.source {
                        person.clone()
                    } else {
                        p
                    }
                })
                .collect();
            let plan = allocator::plan(
                &source_pool,
                source_layout,
                &self.config.ranks,
                &date_format,
                &occupants,
                PoolChange::Resort,
            )?;
            (plan.writes, plan.assignments, vec![source_pool.sheet.clone()])
        } else {
            let dest_layout = self.layout_for(&dest_pool)?;
            let dest_occupants = occupants_of(&self.index, &fresh, &dest_pool);
            let dest_plan = allocator::plan(
                &dest_pool,
                dest_layout,
                &self.config.ranks,
                &date_format,
                &dest_occupants,
                PoolChange::Insert(person.clone()),
            )?;
            let source_occupants = occupants_of(&self.index, &fresh, &source_pool);
            let source_plan = allocator::plan(
                &source_pool,
                source_layout,
                &self.config.ranks,
                &date_format,
                &source_occupants,
                PoolChange::Remove(cached.source.clone()),
            )?;

            let mut writes = source_plan.writes;
            writes.extend(dest_plan.writes);
            let mut assignments = source_plan.assignments;
            assignments.extend(dest_plan.assignments);
            let mut touched = vec![source_pool.sheet.clone()];
            if !touched.contains(&dest_pool.sheet) {
                touched.push(dest_pool.sheet.clone());
            }
            (writes, assignments, touched)
        };

        self.commit(&writes, &touched).await?;
        let after = self.reprime().await?;
        Ok(MutationDelta {
            updated: assignments,
            created: Vec::new(),
            deleted: None,
            availability: after.availability.clone(),
        })
    }

    /// Remove, returning the structured result
    ///
    /// # Errors
    /// `NotFound`, `Conflict`, `Busy`, plus grid faults.
    pub async fn try_remove(&self, identity: &str) -> Result<MutationDelta, EngineError> {
        tracing::info!(identity, "remove");
        let view = self.roster().await?;
        let person = view
            .find_identity(identity)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("'{identity}'")))?;
        drop(view);

        let token = self.acquire().await?;
        let result = self.remove_locked(&person).await;
        self.release(token).await;
        result
    }

    async fn remove_locked(&self, cached: &Person) -> Result<MutationDelta, EngineError> {
        let pool = self.pool_at(&cached.source)?;
        let layout = self.layout_for(&pool)?;
        self.verify(layout, cached).await?;

        let fresh = self.fresh_view().await?;
        let occupants = occupants_of(&self.index, &fresh, &pool);
        let plan = allocator::plan(
            &pool,
            layout,
            &self.config.ranks,
            &self.config.chrono_date_format(),
            &occupants,
            PoolChange::Remove(cached.source.clone()),
        )?;
        self.commit(&plan.writes, &[pool.sheet.clone()]).await?;
        let after = self.reprime().await?;
        Ok(MutationDelta {
            updated: plan.moved(&occupants),
            created: Vec::new(),
            deleted: Some(cached.source.clone()),
            availability: after.availability.clone(),
        })
    }

    /// Field edit, returning the structured result
    ///
    /// # Errors
    /// `Validation` for undeclared custom keys or duplicate contact ids,
    /// `NotFound`, `Conflict`, `Busy`, plus grid faults.
    pub async fn try_edit_fields(
        &self,
        identity: &str,
        updates: FieldUpdates,
    ) -> Result<MutationDelta, EngineError> {
        tracing::info!(identity, "edit_fields");
        for key in updates.custom.keys() {
            if !self.config.custom_fields.iter().any(|f| f.key == *key) {
                return Err(EngineError::Validation(format!(
                    "'{key}' is not an editable field"
                )));
            }
        }
        let view = self.roster().await?;
        let person = view
            .find_identity(identity)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("'{identity}'")))?;
        if let Some(contact) = updates.contact_id.as_deref() {
            validate::check_unique(&view, &person.identity, Some(contact), Some(&person.source))?;
        }
        drop(view);

        let token = self.acquire().await?;
        let result = self.edit_locked(&person, &updates).await;
        self.release(token).await;
        result
    }

    async fn edit_locked(
        &self,
        cached: &Person,
        updates: &FieldUpdates,
    ) -> Result<MutationDelta, EngineError> {
        let pool = self.pool_at(&cached.source)?;
        let layout = self.layout_for(&pool)?;
        self.verify(layout, cached).await?;

        for key in updates.custom.keys() {
            if layout.offset(&FieldKey::Custom(key.clone())).is_none() {
                return Err(EngineError::Validation(format!(
                    "'{key}' has no position in the '{}' layout",
                    pool.layout_name
                )));
            }
        }

        let fresh = self.fresh_view().await?;
        let mut person = fresh
            .find_source(&cached.source)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("'{}'", cached.identity)))?;

        if let Some(region) = &updates.region {
            person.region = non_blank(region);
        }
        if let Some(contact) = &updates.contact_id {
            person.contact_id = non_blank(contact);
        }
        if let Some(email) = &updates.email {
            person.email = non_blank(email);
        }
        if let Some(on_leave) = updates.on_leave {
            person.on_leave = on_leave;
            if !on_leave {
                person.leave = None;
            }
        }
        if let Some(leave) = &updates.leave {
            person.leave = Some(leave.clone());
        }
        if let Some(passed) = updates.training_passed {
            person.training_passed = passed;
        }
        for (key, value) in &updates.custom {
            if value.trim().is_empty() {
                person.custom.shift_remove(key);
            } else {
                person.custom.insert(key.clone(), value.clone());
            }
        }

        // Only cells for fields the request actually set are written; the
        // rest of the record block stays untouched. Identity, rank, and
        // position are never part of an edit.
        let mut touched: Vec<FieldKey> = Vec::new();
        if updates.region.is_some() {
            touched.push(FieldKey::Region);
        }
        if updates.contact_id.is_some() {
            touched.push(FieldKey::ContactId);
        }
        if updates.email.is_some() {
            // The email rides on the identity cell's annotation.
            touched.push(FieldKey::Identity);
        }
        if updates.on_leave.is_some() || updates.leave.is_some() {
            touched.push(FieldKey::LeaveFlag);
        }
        if updates.training_passed.is_some() {
            touched.push(FieldKey::TrainingFlag);
        }
        touched.extend(updates.custom.keys().map(|k| FieldKey::Custom(k.clone())));

        let writes = field_writes(
            &person,
            layout,
            &person.source,
            &self.config.ranks,
            &self.config.chrono_date_format(),
            &touched,
        );
        self.commit(&writes, &[pool.sheet.clone()]).await?;
        let after = self.reprime().await?;
        Ok(MutationDelta {
            updated: vec![person],
            created: Vec::new(),
            deleted: None,
            availability: after.availability.clone(),
        })
    }

    /// Full roster scan: ensure every blueprint sheet, materialize every
    /// pool coordinate, derive availability
    async fn scan_roster(&self) -> Result<RosterView, EngineError> {
        self.sheets.ensure(&self.index.sheets()).await?;
        let mut people = Vec::new();
        for pool in self.index.pools() {
            let layout = self.config.layout(&pool.layout_name)?;
            let snapshot = self.sheets.get(&pool.sheet);
            for coord in &pool.coordinates {
                if let Some(person) = materialize(coord, pool, layout, &snapshot, &self.config) {
                    people.push(person);
                }
            }
        }
        people.sort_by(|a, b| {
            (&a.source.sheet, a.source.row, a.source.col)
                .cmp(&(&b.source.sheet, b.source.row, b.source.col))
        });
        let availability = AvailabilityMap::compute(&self.index, &people);
        Ok(RosterView {
            people,
            availability,
        })
    }

    /// Scan guaranteed to reflect the live grid, used under the lease
    async fn fresh_view(&self) -> Result<RosterView, EngineError> {
        self.sheets.invalidate(&self.index.sheets()).await?;
        self.scan_roster().await
    }

    async fn acquire(&self) -> Result<LeaseToken, EngineError> {
        Ok(self.lease.acquire(self.config.lock_timeout()).await?)
    }

    async fn release(&self, token: LeaseToken) {
        if let Err(e) = self.lease.release(token).await {
            tracing::warn!(error = %e, "lease release failed");
        }
    }

    async fn verify(&self, layout: &Layout, cached: &Person) -> Result<(), EngineError> {
        match guard::verify(self.store.as_ref(), layout, cached).await {
            Ok(()) => Ok(()),
            Err(e) => {
                if matches!(e, EngineError::Conflict { .. }) {
                    self.aggregates.invalidate();
                }
                Err(e)
            }
        }
    }

    /// Commit a batch, then invalidate both cache tiers for the touched
    /// sheets; a mid-write fault purges aggregates before propagating
    async fn commit(&self, writes: &[CellWrite], sheets: &[String]) -> Result<(), EngineError> {
        if let Err(e) = self.store.write_batch(writes).await {
            self.aggregates.invalidate();
            tracing::error!(error = %e, cells = writes.len(), "write batch failed");
            return Err(e.into());
        }
        // The batch is committed from here on: derived state must not
        // outlive it, even when sheet invalidation itself fails.
        if let Err(e) = self.sheets.invalidate(sheets).await {
            self.aggregates.invalidate();
            tracing::error!(error = %e, "sheet invalidation failed after commit");
            return Err(e.into());
        }
        self.aggregates.invalidate();
        Ok(())
    }

    /// Recompute the derived view after a commit and prime the cache
    async fn reprime(&self) -> Result<Arc<RosterView>, EngineError> {
        let view = Arc::new(self.scan_roster().await?);
        self.aggregates.prime(Arc::clone(&view)).await;
        Ok(view)
    }

    fn resolve_node(&self, query: &str) -> Result<&NodeContext, EngineError> {
        self.index
            .find_node(query)
            .ok_or_else(|| EngineError::NotFound(format!("no node matches '{query}'")))
    }

    fn pool_at(&self, at: &Coordinate) -> Result<Arc<PoolRef>, EngineError> {
        self.index
            .context_at(at)
            .map(|ctx| Arc::clone(&ctx.pool))
            .ok_or_else(|| EngineError::NotFound(format!("no slot at {at}")))
    }

    fn layout_for(&self, pool: &PoolRef) -> Result<&Layout, EngineError> {
        Ok(self.config.layout(&pool.layout_name)?)
    }

    /// Choose the pool within a node that admits the rank
    ///
    /// A title filter narrows titled pools. The current pool (reassign)
    /// always wins when it matches, full or not; otherwise the first
    /// matching pool with free capacity. All matches full is a capacity
    /// error; no match at all is a validation error.
    fn select_pool(
        &self,
        node: &NodeContext,
        rank: &str,
        title: Option<&str>,
        view: &RosterView,
        current: Option<&Arc<PoolRef>>,
    ) -> Result<Arc<PoolRef>, EngineError> {
        let candidates: Vec<&Arc<PoolRef>> = node
            .pools
            .iter()
            .filter(|pool| match title {
                Some(t) => pool
                    .title
                    .as_deref()
                    .is_some_and(|pt| pt.eq_ignore_ascii_case(t)),
                None => true,
            })
            .filter(|pool| pool.admits(rank))
            .collect();

        if candidates.is_empty() {
            return Err(EngineError::Validation(format!(
                "no slot for {rank} at {}",
                node.path
            )));
        }
        if let Some(current) = current {
            if let Some(found) = candidates.iter().find(|p| Arc::ptr_eq(p, current)) {
                return Ok(Arc::clone(found));
            }
        }
        for pool in &candidates {
            let occupied = occupants_of(&self.index, view, pool).len();
            if occupied < pool.capacity() {
                return Ok(Arc::clone(pool));
            }
        }
        let first = candidates[0];
        Err(EngineError::Capacity {
            pool: Person::location_label(&first.path, first.title.as_deref()),
            capacity: first.capacity(),
        })
    }
}

/// Current occupants of a pool, in scan order
fn occupants_of(index: &BlueprintIndex, view: &RosterView, pool: &Arc<PoolRef>) -> Vec<Person> {
    view.people
        .iter()
        .filter(|p| {
            index
                .context_at(&p.source)
                .is_some_and(|ctx| Arc::ptr_eq(&ctx.pool, pool))
        })
        .cloned()
        .collect()
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
