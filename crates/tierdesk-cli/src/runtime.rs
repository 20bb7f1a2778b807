// Copyright 2026 Tierdesk contributors
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use tierdesk_app::{Account, AccountId, CountQuery, RowQuery, UserRef};
use tierdesk_db::{NewAccount, NewUser, Store};
use tierdesk_testkit::AccountFaker;

const DEMO_SEED: u64 = 20_260_219;
const DEMO_USERS: usize = 8;
const DEMO_ACCOUNTS: usize = 48;

pub struct DbService<'a> {
    store: &'a Store,
}

impl<'a> DbService<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }
}

impl tierdesk_tui::AccountService for DbService<'_> {
    fn fetch_accounts(&mut self, query: &RowQuery) -> Result<Vec<Account>> {
        self.store.query_accounts(query)
    }

    fn count_accounts(&mut self, query: &CountQuery) -> Result<u64> {
        self.store.count_accounts(query)
    }

    fn list_active_users(&mut self) -> Result<Vec<UserRef>> {
        self.store.list_active_users()
    }

    fn promote_accounts(&mut self, account_ids: &[AccountId]) -> Result<usize> {
        self.store.promote_accounts(account_ids)
    }
}

pub fn seed_demo_data(store: &Store) -> Result<()> {
    let mut faker = AccountFaker::new(DEMO_SEED);

    let mut user_ids = Vec::with_capacity(DEMO_USERS);
    for _ in 0..DEMO_USERS {
        let user = faker.user();
        let id = store.insert_user(&NewUser {
            name: user.name,
            is_active: user.is_active,
        })?;
        user_ids.push(id);
    }

    for _ in 0..DEMO_ACCOUNTS {
        let account = faker.account();
        let owner_id = if faker.int_n(10) < 8 {
            Some(user_ids[faker.int_n(user_ids.len())])
        } else {
            None
        };
        let last_modified_by_id = Some(user_ids[faker.int_n(user_ids.len())]);
        store.insert_account(&NewAccount {
            name: account.name,
            phone: account.phone,
            tier: account.tier,
            owner_id,
            last_modified_by_id,
        })?;
    }

    Ok(())
}
