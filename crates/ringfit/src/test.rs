//! Oracle stubs for unit tests.

use std::{cell::Cell, rc::Rc};

use image::RgbImage;

use crate::{
    hand::Hand,
    oracle::{LandmarkOracle, OracleSession},
};

#[derive(Default, Debug)]
struct Counters {
    opened: Cell<usize>,
    released: Cell<usize>,
}

/// An oracle that reports the same hands for every image and counts its sessions.
#[derive(Clone, Default)]
pub struct StubOracle {
    hands: Vec<Hand>,
    counters: Rc<Counters>,
}

impl StubOracle {
    pub fn new(hands: Vec<Hand>) -> Self {
        Self {
            hands,
            counters: Rc::default(),
        }
    }

    pub fn opened(&self) -> usize {
        self.counters.opened.get()
    }

    pub fn released(&self) -> usize {
        self.counters.released.get()
    }
}

impl LandmarkOracle for StubOracle {
    type Session = StubSession;

    fn open(&self) -> anyhow::Result<StubSession> {
        self.counters.opened.set(self.opened() + 1);
        Ok(StubSession {
            hands: Some(self.hands.clone()),
            counters: self.counters.clone(),
        })
    }
}

pub struct StubSession {
    /// `None` makes detection fail.
    hands: Option<Vec<Hand>>,
    counters: Rc<Counters>,
}

impl OracleSession for StubSession {
    fn detect(&mut self, _: &RgbImage) -> anyhow::Result<Vec<Hand>> {
        match &self.hands {
            Some(hands) => Ok(hands.clone()),
            None => anyhow::bail!("detection failed"),
        }
    }
}

impl Drop for StubSession {
    fn drop(&mut self) {
        let released = &self.counters.released;
        released.set(released.get() + 1);
    }
}

/// An oracle whose sessions fail every detection.
#[derive(Clone, Default)]
pub struct FailingOracle {
    counters: Rc<Counters>,
}

impl FailingOracle {
    pub fn opened(&self) -> usize {
        self.counters.opened.get()
    }

    pub fn released(&self) -> usize {
        self.counters.released.get()
    }
}

impl LandmarkOracle for FailingOracle {
    type Session = StubSession;

    fn open(&self) -> anyhow::Result<StubSession> {
        self.counters.opened.set(self.opened() + 1);
        Ok(StubSession {
            hands: None,
            counters: self.counters.clone(),
        })
    }
}
