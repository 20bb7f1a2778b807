// Copyright 2026 Tierdesk contributors
// Licensed under the Apache License, Version 2.0

use std::collections::BTreeSet;

use crate::ids::{AccountId, UserId};
use crate::model::{Account, Notice, NoticeSeverity, SortDirection, SortField, Tier, UserOption, UserRef};
use crate::pane::{CountQuery, PageNav, RowQuery, TierPane};

/// Shared owner constraint consumed by all three panes, plus the options the
/// host offers for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerFilter {
    pub owner_id: Option<UserId>,
    pub user_options: Vec<UserOption>,
    pub error: Option<String>,
}

impl OwnerFilter {
    fn new() -> Self {
        Self {
            owner_id: None,
            user_options: Vec::new(),
            error: None,
        }
    }

    fn apply_users(&mut self, result: Result<Vec<UserRef>, String>) {
        match result {
            Ok(users) => {
                let mut options = vec![UserOption::all_owners()];
                options.extend(users.into_iter().map(|user| UserOption {
                    label: user.name,
                    value: Some(user.id),
                }));
                self.user_options = options;
                self.error = None;
            }
            Err(message) => self.error = Some(message),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromoteState {
    Idle,
    ConfirmPending,
    Executing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchKind {
    Rows,
    Count,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RefreshTicket {
    tier: Tier,
    kind: FetchKind,
    seq: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardCommand {
    SetNameFilter { tier: Tier, value: String },
    SetPhoneFilter { tier: Tier, value: String },
    SetSort { tier: Tier, field: SortField, direction: SortDirection },
    GoToPage { tier: Tier, nav: PageNav },
    SetSelection { tier: Tier, ids: BTreeSet<AccountId> },
    SetOwner(Option<UserId>),
    RequestPromote,
    CancelPromote,
    ConfirmPromote,
}

/// Everything the board asks its host to do. Fetch effects carry a sequence
/// tag; the matching `apply_*` call discards results whose tag has been
/// superseded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardEffect {
    FetchRows { tier: Tier, seq: u64, query: RowQuery },
    FetchCount { tier: Tier, seq: u64, query: CountQuery },
    LoadUsers,
    Promote { account_ids: Vec<AccountId> },
    Notify(Notice),
    SelectionsCleared,
    LoadingChanged(bool),
}

/// The controller for the three tier tables. Mutation is confined to the
/// host's single event loop; the board never performs I/O itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    panes: [TierPane; 3],
    pub owner: OwnerFilter,
    promote: PromoteState,
    loading: bool,
    pending_refresh: Vec<RefreshTicket>,
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl Board {
    pub fn new() -> Self {
        Self {
            panes: [
                TierPane::new(Tier::One),
                TierPane::new(Tier::Two),
                TierPane::new(Tier::Three),
            ],
            owner: OwnerFilter::new(),
            promote: PromoteState::Idle,
            loading: false,
            pending_refresh: Vec::new(),
        }
    }

    pub fn pane(&self, tier: Tier) -> &TierPane {
        &self.panes[tier.index()]
    }

    fn pane_mut(&mut self, tier: Tier) -> &mut TierPane {
        &mut self.panes[tier.index()]
    }

    pub fn promote_state(&self) -> PromoteState {
        self.promote
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn selected_total(&self) -> usize {
        self.panes.iter().map(|pane| pane.selected.len()).sum()
    }

    /// Effects to run once on startup: the user lookup plus the first fetch
    /// of all six subscriptions.
    pub fn init_effects(&mut self) -> Vec<BoardEffect> {
        let mut effects = vec![BoardEffect::LoadUsers];
        effects.extend(self.sync_fetches(false));
        effects
    }

    pub fn dispatch(&mut self, command: BoardCommand) -> Vec<BoardEffect> {
        match command {
            BoardCommand::SetNameFilter { tier, value } => {
                let pane = self.pane_mut(tier);
                pane.name_filter = value;
                pane.current_page = 1;
                self.sync_fetches(false)
            }
            BoardCommand::SetPhoneFilter { tier, value } => {
                let pane = self.pane_mut(tier);
                pane.phone_filter = value;
                pane.current_page = 1;
                self.sync_fetches(false)
            }
            BoardCommand::SetSort { tier, field, direction } => {
                let pane = self.pane_mut(tier);
                pane.sort_field = field;
                pane.sort_direction = direction;
                pane.current_page = 1;
                self.sync_fetches(false)
            }
            BoardCommand::GoToPage { tier, nav } => {
                self.pane_mut(tier).go_to(nav);
                self.sync_fetches(false)
            }
            BoardCommand::SetSelection { tier, ids } => {
                self.pane_mut(tier).selected = ids;
                Vec::new()
            }
            BoardCommand::SetOwner(owner_id) => {
                self.owner.owner_id = owner_id;
                for pane in &mut self.panes {
                    pane.current_page = 1;
                }
                self.sync_fetches(false)
            }
            BoardCommand::RequestPromote => self.request_promote(),
            BoardCommand::CancelPromote => {
                if self.promote == PromoteState::ConfirmPending {
                    self.promote = PromoteState::Idle;
                }
                Vec::new()
            }
            BoardCommand::ConfirmPromote => self.confirm_promote(),
        }
    }

    /// Compares each pane's derived parameter tuples against the last issued
    /// ones and emits fetches for the tuples that changed. `force` re-issues
    /// everything, which is how the post-promotion fan-out works.
    fn sync_fetches(&mut self, force: bool) -> Vec<BoardEffect> {
        let owner_id = self.owner.owner_id;
        let mut effects = Vec::new();
        for pane in &mut self.panes {
            let row_query = pane.derived_row_query(owner_id);
            if force || pane.last_rows_query.as_ref() != Some(&row_query) {
                pane.rows_seq += 1;
                pane.last_rows_query = Some(row_query.clone());
                effects.push(BoardEffect::FetchRows {
                    tier: pane.tier,
                    seq: pane.rows_seq,
                    query: row_query,
                });
            }

            let count_query = pane.derived_count_query(owner_id);
            if force || pane.last_count_query.as_ref() != Some(&count_query) {
                pane.count_seq += 1;
                pane.last_count_query = Some(count_query.clone());
                effects.push(BoardEffect::FetchCount {
                    tier: pane.tier,
                    seq: pane.count_seq,
                    query: count_query,
                });
            }
        }
        effects
    }

    pub fn apply_rows(
        &mut self,
        tier: Tier,
        seq: u64,
        result: Result<Vec<Account>, String>,
    ) -> Vec<BoardEffect> {
        let pane = self.pane_mut(tier);
        if seq == pane.rows_seq {
            match result {
                Ok(accounts) => pane.accept_rows(&accounts),
                Err(message) => pane.error = Some(message),
            }
        }
        self.settle_refresh(tier, FetchKind::Rows, seq)
    }

    pub fn apply_count(
        &mut self,
        tier: Tier,
        seq: u64,
        result: Result<u64, String>,
    ) -> Vec<BoardEffect> {
        let pane = self.pane_mut(tier);
        if seq == pane.count_seq {
            match result {
                Ok(count) => pane.total_records = count,
                Err(message) => pane.error = Some(message),
            }
        }
        self.settle_refresh(tier, FetchKind::Count, seq)
    }

    pub fn apply_users(&mut self, result: Result<Vec<UserRef>, String>) {
        self.owner.apply_users(result);
    }

    fn request_promote(&mut self) -> Vec<BoardEffect> {
        if self.promote != PromoteState::Idle {
            return Vec::new();
        }
        if self.combined_selection().is_empty() {
            return vec![BoardEffect::Notify(Notice::new(
                "Attention",
                "Select at least one account to promote.",
                NoticeSeverity::Warning,
            ))];
        }
        self.promote = PromoteState::ConfirmPending;
        Vec::new()
    }

    fn confirm_promote(&mut self) -> Vec<BoardEffect> {
        if self.promote != PromoteState::ConfirmPending {
            return Vec::new();
        }

        // Recompute from the live selections; the confirmation gate never
        // holds a snapshot.
        let ids = self.combined_selection();
        if ids.is_empty() {
            self.promote = PromoteState::Idle;
            return Vec::new();
        }

        self.promote = PromoteState::Executing;
        self.loading = true;
        vec![
            BoardEffect::LoadingChanged(true),
            BoardEffect::Promote {
                account_ids: ids.into_iter().collect(),
            },
        ]
    }

    pub fn apply_promote_result(&mut self, result: Result<(), String>) -> Vec<BoardEffect> {
        if self.promote != PromoteState::Executing {
            return Vec::new();
        }

        match result {
            Ok(()) => {
                let mut effects = vec![BoardEffect::Notify(Notice::new(
                    "Success",
                    "Selected accounts were promoted.",
                    NoticeSeverity::Success,
                ))];
                effects.extend(self.sync_fetches(true));
                self.pending_refresh = self
                    .panes
                    .iter()
                    .flat_map(|pane| {
                        [
                            RefreshTicket {
                                tier: pane.tier,
                                kind: FetchKind::Rows,
                                seq: pane.rows_seq,
                            },
                            RefreshTicket {
                                tier: pane.tier,
                                kind: FetchKind::Count,
                                seq: pane.count_seq,
                            },
                        ]
                    })
                    .collect();
                effects
            }
            Err(message) => {
                self.promote = PromoteState::Idle;
                self.loading = false;
                vec![
                    BoardEffect::Notify(Notice::new(
                        "Promotion failed",
                        message,
                        NoticeSeverity::Error,
                    )),
                    BoardEffect::LoadingChanged(false),
                ]
            }
        }
    }

    /// A refresh ticket settles once any result at or past its sequence has
    /// been attempted for that tier and kind, success or failure. Once all
    /// six have settled the selections are cleared and the workflow closes.
    fn settle_refresh(&mut self, tier: Tier, kind: FetchKind, seq: u64) -> Vec<BoardEffect> {
        if self.promote != PromoteState::Executing {
            return Vec::new();
        }
        // No tickets means the promote result has not fanned out yet; a late
        // result from an earlier mutation must not close the workflow.
        if self.pending_refresh.is_empty() {
            return Vec::new();
        }

        self.pending_refresh
            .retain(|ticket| !(ticket.tier == tier && ticket.kind == kind && ticket.seq <= seq));
        if !self.pending_refresh.is_empty() {
            return Vec::new();
        }

        for pane in &mut self.panes {
            pane.selected.clear();
        }
        self.promote = PromoteState::Idle;
        self.loading = false;
        vec![
            BoardEffect::SelectionsCleared,
            BoardEffect::LoadingChanged(false),
        ]
    }

    fn combined_selection(&self) -> BTreeSet<AccountId> {
        let mut ids = BTreeSet::new();
        for pane in &self.panes {
            ids.extend(pane.selected.iter().copied());
        }
        ids
    }
}
