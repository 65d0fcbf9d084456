// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! One-shot timer with idempotent disarm.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use super::{Engine, TimerId};

/// Owning wrapper around an engine timer registration.
///
/// Arming an already armed timer replaces the pending registration; a fired
/// timer marks itself disarmed before its callback runs, so re-arming from
/// inside the callback behaves like a fresh arm. Dropping the wrapper
/// cancels any pending registration.
pub struct Timer {
    engine: Rc<dyn Engine>,
    id: TimerId,
    armed: Rc<Cell<bool>>,
}

impl Timer {
    pub fn new(engine: Rc<dyn Engine>) -> Self {
        Self {
            engine,
            id: TimerId::allocate(),
            armed: Rc::new(Cell::new(false)),
        }
    }

    /// Arm the timer; `callback` fires once after `delay`.
    pub fn arm(&self, delay: Duration, callback: impl FnOnce() + 'static) {
        self.disarm();
        let armed = Rc::clone(&self.armed);
        self.engine.arm_timer(
            self.id,
            delay,
            Box::new(move || {
                armed.set(false);
                callback();
            }),
        );
        self.armed.set(true);
    }

    /// Cancel a pending registration. A no-op when not armed.
    pub fn disarm(&self) {
        if !self.armed.get() {
            return;
        }
        self.engine.disarm_timer(self.id);
        self.armed.set(false);
    }

    pub fn is_armed(&self) -> bool {
        self.armed.get()
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.disarm();
    }
}
