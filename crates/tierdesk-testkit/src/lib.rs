// Copyright 2026 Tierdesk contributors
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use std::path::PathBuf;
use tierdesk_app::Tier;

const COMPANY_ADJECTIVES: [&str; 14] = [
    "Premier", "Central", "Reliable", "Bright", "Quality", "Summit", "Eagle", "Heritage",
    "Greenleaf", "Apex", "Cascade", "Pioneer", "Granite", "Beacon",
];

const COMPANY_NOUNS: [&str; 14] = [
    "Logistics",
    "Manufacturing",
    "Analytics",
    "Robotics",
    "Foods",
    "Textiles",
    "Freight",
    "Packaging",
    "Optics",
    "Materials",
    "Dynamics",
    "Systems",
    "Holdings",
    "Labs",
];

const COMPANY_SUFFIXES: [&str; 6] = ["Inc", "LLC", "Co", "Group", "Partners", "Corp"];

const FIRST_NAMES: [&str; 16] = [
    "Avery", "Jordan", "Taylor", "Riley", "Morgan", "Casey", "Alex", "Quinn", "Parker", "Drew",
    "Kai", "Elliot", "Robin", "Cameron", "Hayden", "Rowan",
];
const LAST_NAMES: [&str; 18] = [
    "Walker", "Martin", "Hill", "Evans", "Lopez", "Gray", "Ward", "Young", "Diaz", "Reed",
    "Campbell", "Turner", "Flores", "Bennett", "Price", "Morris", "Foster", "Brooks",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeUser {
    pub name: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeAccount {
    pub name: String,
    pub phone: String,
    pub tier: Tier,
}

#[derive(Debug, Clone)]
struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
        if state == 0 {
            state = 0xA409_3822_299F_31D0;
        }
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);

        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    fn int_n(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        (self.next_u64() % (n as u64)) as usize
    }

    fn bool(&mut self) -> bool {
        (self.next_u64() & 1) == 1
    }
}

/// Seeded generator for demo users and accounts. The same seed always yields
/// the same sequence.
#[derive(Debug, Clone)]
pub struct AccountFaker {
    rng: DeterministicRng,
}

impl AccountFaker {
    pub fn new(seed: u64) -> Self {
        let normalized = if seed == 0 { 1 } else { seed };
        Self {
            rng: DeterministicRng::new(normalized),
        }
    }

    pub fn int_n(&mut self, n: usize) -> usize {
        self.rng.int_n(n)
    }

    pub fn user(&mut self) -> FakeUser {
        FakeUser {
            name: format!("{} {}", self.pick(&FIRST_NAMES), self.pick(&LAST_NAMES)),
            is_active: self.int_range_i32(1, 10) <= 8,
        }
    }

    pub fn account(&mut self) -> FakeAccount {
        let tier = Tier::ALL[self.rng.int_n(Tier::ALL.len())];
        self.account_in_tier(tier)
    }

    pub fn account_in_tier(&mut self, tier: Tier) -> FakeAccount {
        FakeAccount {
            name: self.company_name(),
            phone: format!(
                "({:03}) {:03}-{:04}",
                self.int_range_i32(200, 999),
                self.int_range_i32(200, 999),
                self.int_range_i32(0, 9_999),
            ),
            tier,
        }
    }

    fn company_name(&mut self) -> String {
        if self.rng.bool() {
            format!(
                "{} {} {}",
                self.pick(&COMPANY_ADJECTIVES),
                self.pick(&COMPANY_NOUNS),
                self.pick(&COMPANY_SUFFIXES),
            )
        } else {
            format!("{} {}", self.pick(&LAST_NAMES), self.pick(&COMPANY_NOUNS))
        }
    }

    fn pick<'a>(&mut self, items: &'a [&'a str]) -> &'a str {
        items[self.rng.int_n(items.len())]
    }

    fn int_range_i32(&mut self, min: i32, max: i32) -> i32 {
        if max <= min {
            return min;
        }
        let span = i64::from(max) - i64::from(min) + 1;
        let offset = (self.rng.next_u64() % (span as u64)) as i64;
        (i64::from(min) + offset) as i32
    }
}

pub fn temp_db_path() -> Result<(tempfile::TempDir, PathBuf)> {
    let dir = tempfile::tempdir().context("create temp dir")?;
    let db_path = dir.path().join("tierdesk.db");
    Ok((dir, db_path))
}

pub fn fixture_datetime() -> &'static str {
    "2026-02-19T12:34:56Z"
}
