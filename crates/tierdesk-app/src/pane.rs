// Copyright 2026 Tierdesk contributors
// Licensed under the Apache License, Version 2.0

use std::collections::BTreeSet;

use crate::ids::{AccountId, UserId};
use crate::model::{Account, AccountRow, SortDirection, SortField, Tier};

pub const PAGE_SIZE: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageNav {
    First,
    Prev,
    Next,
    Last,
}

/// Full parameter tuple for one tier's row fetch. Equality drives the
/// "parameters changed, issue a request" derivation in the board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowQuery {
    pub tier: Tier,
    pub name_filter: String,
    pub phone_filter: String,
    pub owner_id: Option<UserId>,
    pub sort_field: SortField,
    pub sort_direction: SortDirection,
    pub page_size: u64,
    pub offset: u64,
}

/// Count tuple: the row tuple minus sort and paging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountQuery {
    pub tier: Tier,
    pub name_filter: String,
    pub phone_filter: String,
    pub owner_id: Option<UserId>,
}

/// Per-tier table state: filters, sort, paging, selection, the fetched page
/// window, and the request tags that guard against stale results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierPane {
    pub tier: Tier,
    pub name_filter: String,
    pub phone_filter: String,
    pub sort_field: SortField,
    pub sort_direction: SortDirection,
    pub current_page: u64,
    pub total_records: u64,
    pub rows: Vec<AccountRow>,
    pub selected: BTreeSet<AccountId>,
    pub error: Option<String>,
    pub(crate) rows_seq: u64,
    pub(crate) count_seq: u64,
    pub(crate) last_rows_query: Option<RowQuery>,
    pub(crate) last_count_query: Option<CountQuery>,
}

impl TierPane {
    pub fn new(tier: Tier) -> Self {
        Self {
            tier,
            name_filter: String::new(),
            phone_filter: String::new(),
            sort_field: SortField::LastModifiedBy,
            sort_direction: SortDirection::Desc,
            current_page: 1,
            total_records: 0,
            rows: Vec::new(),
            selected: BTreeSet::new(),
            error: None,
            rows_seq: 0,
            count_seq: 0,
            last_rows_query: None,
            last_count_query: None,
        }
    }

    pub fn total_pages(&self) -> u64 {
        if self.total_records == 0 {
            1
        } else {
            self.total_records.div_ceil(PAGE_SIZE)
        }
    }

    pub fn is_first_page(&self) -> bool {
        self.current_page == 1
    }

    pub fn is_last_page(&self) -> bool {
        self.current_page >= self.total_pages() || self.total_records == 0
    }

    pub fn offset(&self) -> u64 {
        (self.current_page - 1) * PAGE_SIZE
    }

    /// Bounded page navigation; `Prev` at page 1 and `Next` at the last page
    /// leave the page untouched.
    pub fn go_to(&mut self, nav: PageNav) {
        self.current_page = match nav {
            PageNav::First => 1,
            PageNav::Prev => {
                if self.current_page > 1 {
                    self.current_page - 1
                } else {
                    self.current_page
                }
            }
            PageNav::Next => {
                if self.current_page < self.total_pages() {
                    self.current_page + 1
                } else {
                    self.current_page
                }
            }
            PageNav::Last => self.total_pages(),
        };
    }

    pub fn derived_row_query(&self, owner_id: Option<UserId>) -> RowQuery {
        RowQuery {
            tier: self.tier,
            name_filter: self.name_filter.clone(),
            phone_filter: self.phone_filter.clone(),
            owner_id,
            sort_field: self.sort_field,
            sort_direction: self.sort_direction,
            page_size: PAGE_SIZE,
            offset: self.offset(),
        }
    }

    pub fn derived_count_query(&self, owner_id: Option<UserId>) -> CountQuery {
        CountQuery {
            tier: self.tier,
            name_filter: self.name_filter.clone(),
            phone_filter: self.phone_filter.clone(),
            owner_id,
        }
    }

    pub(crate) fn accept_rows(&mut self, accounts: &[Account]) {
        let mut rows: Vec<AccountRow> = accounts.iter().map(AccountRow::from_account).collect();
        rows.truncate(PAGE_SIZE as usize);
        self.rows = rows;
        self.error = None;
    }
}

#[cfg(test)]
mod tests {
    use super::{PAGE_SIZE, PageNav, TierPane};
    use crate::model::Tier;

    fn pane_with_total(total: u64) -> TierPane {
        let mut pane = TierPane::new(Tier::One);
        pane.total_records = total;
        pane
    }

    #[test]
    fn empty_table_still_has_one_page() {
        let pane = pane_with_total(0);
        assert_eq!(pane.total_pages(), 1);
        assert!(pane.is_first_page());
        assert!(pane.is_last_page());
    }

    #[test]
    fn twenty_five_records_make_three_pages() {
        let mut pane = pane_with_total(25);
        assert_eq!(pane.total_pages(), 3);

        pane.go_to(PageNav::Last);
        assert_eq!(pane.current_page, 3);
        assert!(pane.is_last_page());

        pane.go_to(PageNav::Next);
        assert_eq!(pane.current_page, 3, "next at the last page is a no-op");
    }

    #[test]
    fn prev_at_page_one_is_a_no_op() {
        let mut pane = pane_with_total(40);
        pane.go_to(PageNav::Prev);
        assert_eq!(pane.current_page, 1);

        pane.go_to(PageNav::Next);
        pane.go_to(PageNav::Prev);
        assert_eq!(pane.current_page, 1);
    }

    #[test]
    fn offset_tracks_the_page_window() {
        let mut pane = pane_with_total(35);
        assert_eq!(pane.offset(), 0);
        pane.go_to(PageNav::Next);
        assert_eq!(pane.offset(), PAGE_SIZE);
        pane.go_to(PageNav::Last);
        assert_eq!(pane.offset(), 3 * PAGE_SIZE);
    }

    #[test]
    fn exact_page_boundary_rounds_without_an_extra_page() {
        let pane = pane_with_total(30);
        assert_eq!(pane.total_pages(), 3);
    }
}
