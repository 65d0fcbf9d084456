// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Default reactor on top of `mio::Poll`.
//!
//! The epoll fd behind `mio::Poll` is exposed as the engine fd, which keeps
//! the whole engine pollable from the outside: a `mio::Waker` registration
//! makes posted callbacks visible to external pollers, and a `timerfd`
//! carries timer deadlines, so readiness of *any* pending work surfaces as
//! POLLIN on the one fd.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::io;
use std::os::unix::io::{AsRawFd, RawFd};
use std::rc::Rc;
use std::time::{Duration, Instant};

use mio::unix::SourceFd;
use mio::{Events, Interest, Poll, Token, Waker};

use super::{Callback, Engine, EventHandler, TimerId, EVENT_IN, EVENT_OUT};
use crate::sdl_abort;

/// Token of the waker registration.
const WAKER_TOKEN: Token = Token(usize::MAX);

/// Token of the timerfd registration.
const TIMERFD_TOKEN: Token = Token(usize::MAX - 1);

/// Maximum events drained per `handle_events` pass.
const MAX_EVENTS: usize = 64;

/// Reactor implementation backed by `mio::Poll` and a `timerfd`.
pub struct PollEngine {
    poll: RefCell<Poll>,
    waker: Waker,
    timer_fd: RawFd,
    posted: RefCell<VecDeque<Callback>>,
    handlers: RefCell<HashMap<RawFd, Rc<RefCell<EventHandler>>>>,
    timers: RefCell<TimerTable>,
}

#[derive(Default)]
struct TimerTable {
    // Ordered by deadline; TimerId breaks ties.
    pending: BTreeMap<(Instant, TimerId), Callback>,
    deadlines: HashMap<TimerId, Instant>,
}

impl TimerTable {
    fn earliest(&self) -> Option<Instant> {
        self.pending.keys().next().map(|(deadline, _)| *deadline)
    }
}

impl PollEngine {
    /// Create an engine with its own poller, waker and timerfd.
    pub fn new() -> io::Result<Self> {
        let poll = Poll::new()?;
        let waker = Waker::new(poll.registry(), WAKER_TOKEN)?;

        let timer_fd =
            unsafe { libc::timerfd_create(libc::CLOCK_MONOTONIC, libc::TFD_NONBLOCK | libc::TFD_CLOEXEC) };
        if timer_fd < 0 {
            return Err(io::Error::last_os_error());
        }
        poll.registry()
            .register(&mut SourceFd(&timer_fd), TIMERFD_TOKEN, Interest::READABLE)?;

        Ok(Self {
            poll: RefCell::new(poll),
            waker,
            timer_fd,
            posted: RefCell::new(VecDeque::new()),
            handlers: RefCell::new(HashMap::new()),
            timers: RefCell::new(TimerTable::default()),
        })
    }

    fn run_posted_callbacks(&self) {
        loop {
            // Take the whole batch out so callbacks may post more without
            // holding the queue borrow.
            let batch: Vec<Callback> = {
                let mut posted = self.posted.borrow_mut();
                if posted.is_empty() {
                    return;
                }
                posted.drain(..).collect()
            };
            for callback in batch {
                callback();
            }
        }
    }

    fn program_timerfd(&self) {
        let next = self.timers.borrow().earliest();
        let value = match next {
            None => libc::timespec { tv_sec: 0, tv_nsec: 0 },
            Some(deadline) => {
                let delta = deadline.saturating_duration_since(Instant::now());
                let mut value = libc::timespec {
                    tv_sec: delta.as_secs() as libc::time_t,
                    tv_nsec: delta.subsec_nanos() as libc::c_long,
                };
                // An all-zero it_value disarms; an already due deadline must
                // still fire.
                if value.tv_sec == 0 && value.tv_nsec == 0 {
                    value.tv_nsec = 1;
                }
                value
            }
        };
        let spec = libc::itimerspec {
            it_interval: libc::timespec { tv_sec: 0, tv_nsec: 0 },
            it_value: value,
        };
        let rc = unsafe { libc::timerfd_settime(self.timer_fd, 0, &spec, std::ptr::null_mut()) };
        if rc != 0 {
            sdl_abort!(
                "[Engine] timerfd_settime failed: {}",
                io::Error::last_os_error()
            );
        }
    }

    fn drain_timerfd(&self) {
        let mut expirations = [0u8; 8];
        loop {
            let rc = unsafe {
                libc::read(
                    self.timer_fd,
                    expirations.as_mut_ptr().cast::<libc::c_void>(),
                    expirations.len(),
                )
            };
            if rc <= 0 {
                break;
            }
        }
    }

    fn run_expired_timers(&self) {
        let now = Instant::now();
        let mut due: Vec<Callback> = Vec::new();
        {
            let mut timers = self.timers.borrow_mut();
            while let Some(&(deadline, id)) = timers.pending.keys().next() {
                if deadline > now {
                    break;
                }
                if let Some(callback) = timers.pending.remove(&(deadline, id)) {
                    timers.deadlines.remove(&id);
                    due.push(callback);
                }
            }
        }
        self.program_timerfd();
        for callback in due {
            callback();
        }
    }

    fn dispatch_fd(&self, fd: RawFd, readiness: u32) {
        // Clone the handler slot so the handler may delete or replace its
        // own registration while running.
        let handler = self.handlers.borrow().get(&fd).map(Rc::clone);
        if let Some(handler) = handler {
            (handler.borrow_mut())(readiness);
        }
    }
}

impl Engine for PollEngine {
    fn fd(&self) -> RawFd {
        self.poll.borrow().as_raw_fd()
    }

    fn handle_events(&self) {
        self.run_posted_callbacks();

        let mut events = Events::with_capacity(MAX_EVENTS);
        let ready: Vec<(Token, u32)> = {
            let mut poll = self.poll.borrow_mut();
            match poll.poll(&mut events, Some(Duration::ZERO)) {
                Ok(()) => {}
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => return,
                Err(e) => sdl_abort!("[Engine] poll failed: {e}"),
            }
            events
                .iter()
                .map(|event| {
                    let mut readiness = 0;
                    if event.is_readable() || event.is_read_closed() {
                        readiness |= EVENT_IN;
                    }
                    if event.is_writable() {
                        readiness |= EVENT_OUT;
                    }
                    (event.token(), readiness)
                })
                .collect()
        };

        for (token, readiness) in ready {
            match token {
                WAKER_TOKEN => {} // queue drained below
                TIMERFD_TOKEN => {
                    self.drain_timerfd();
                    self.run_expired_timers();
                }
                Token(fd) => self.dispatch_fd(fd as RawFd, readiness),
            }
        }

        // Completions posted by fd handlers or timers run in the same pass.
        self.run_posted_callbacks();
    }

    fn add_monitored_fd(&self, fd: RawFd, events: u32, handler: EventHandler) {
        let mut interest = Interest::READABLE;
        if events & EVENT_OUT != 0 {
            interest = if events & EVENT_IN != 0 {
                Interest::READABLE | Interest::WRITABLE
            } else {
                Interest::WRITABLE
            };
        }
        if let Err(e) = self
            .poll
            .borrow()
            .registry()
            .register(&mut SourceFd(&fd), Token(fd as usize), interest)
        {
            sdl_abort!("[Engine] cannot monitor fd {fd}: {e}");
        }
        self.handlers
            .borrow_mut()
            .insert(fd, Rc::new(RefCell::new(handler)));
    }

    fn delete_monitored_fd(&self, fd: RawFd) {
        // The fd may already be closed by its owner; deregistration failure
        // is not actionable.
        let _ = self
            .poll
            .borrow()
            .registry()
            .deregister(&mut SourceFd(&fd));
        self.handlers.borrow_mut().remove(&fd);
    }

    fn arm_timer(&self, timer: TimerId, delay: Duration, callback: Callback) {
        let deadline = Instant::now() + delay;
        {
            let mut timers = self.timers.borrow_mut();
            if let Some(previous) = timers.deadlines.insert(timer, deadline) {
                timers.pending.remove(&(previous, timer));
            }
            timers.pending.insert((deadline, timer), callback);
        }
        self.program_timerfd();
    }

    fn disarm_timer(&self, timer: TimerId) {
        {
            let mut timers = self.timers.borrow_mut();
            if let Some(deadline) = timers.deadlines.remove(&timer) {
                timers.pending.remove(&(deadline, timer));
            }
        }
        self.program_timerfd();
    }

    fn post_callback(&self, callback: Callback) {
        self.posted.borrow_mut().push_back(callback);
        // Keeps the engine fd readable for external pollers even when the
        // poll was already consumed this tick.
        let _ = self.waker.wake();
    }
}

impl Drop for PollEngine {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.timer_fd);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn poll_engine_fd(engine: &PollEngine, timeout_ms: i32) -> bool {
        let mut pfd = libc::pollfd {
            fd: engine.fd(),
            events: libc::POLLIN,
            revents: 0,
        };
        let rc = unsafe { libc::poll(&mut pfd, 1, timeout_ms) };
        rc > 0 && (pfd.revents & libc::POLLIN) != 0
    }

    fn drive_until(engine: &PollEngine, deadline: Duration, mut done: impl FnMut() -> bool) -> bool {
        let start = Instant::now();
        while start.elapsed() < deadline {
            if done() {
                return true;
            }
            poll_engine_fd(engine, 10);
            engine.handle_events();
        }
        done()
    }

    #[test]
    fn test_posted_callbacks_run_in_posting_order() {
        let engine = PollEngine::new().unwrap();
        let order = Rc::new(RefCell::new(Vec::new()));
        for i in 0..4 {
            let order = Rc::clone(&order);
            engine.post_callback(Box::new(move || order.borrow_mut().push(i)));
        }
        engine.handle_events();
        assert_eq!(*order.borrow(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_callback_posted_from_callback_runs_same_pass() {
        let engine = Rc::new(PollEngine::new().unwrap());
        let hits = Rc::new(Cell::new(0));
        {
            let engine2 = Rc::clone(&engine);
            let hits2 = Rc::clone(&hits);
            engine.post_callback(Box::new(move || {
                hits2.set(hits2.get() + 1);
                let hits3 = Rc::clone(&hits2);
                engine2.post_callback(Box::new(move || hits3.set(hits3.get() + 1)));
            }));
        }
        engine.handle_events();
        assert_eq!(hits.get(), 2);
    }

    #[test]
    fn test_posted_callback_makes_engine_fd_readable() {
        let engine = PollEngine::new().unwrap();
        assert!(!poll_engine_fd(&engine, 0));
        engine.post_callback(Box::new(|| {}));
        assert!(poll_engine_fd(&engine, 100));
    }

    #[test]
    fn test_timer_fires_once() {
        let engine = PollEngine::new().unwrap();
        let fired = Rc::new(Cell::new(0));
        let fired2 = Rc::clone(&fired);
        engine.arm_timer(
            TimerId::allocate(),
            Duration::from_millis(5),
            Box::new(move || fired2.set(fired2.get() + 1)),
        );
        assert!(drive_until(&engine, Duration::from_secs(2), || fired.get() > 0));
        // No second expiration.
        std::thread::sleep(Duration::from_millis(20));
        engine.handle_events();
        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn test_disarmed_timer_does_not_fire() {
        let engine = PollEngine::new().unwrap();
        let fired = Rc::new(Cell::new(false));
        let fired2 = Rc::clone(&fired);
        let id = TimerId::allocate();
        engine.arm_timer(id, Duration::from_millis(5), Box::new(move || fired2.set(true)));
        engine.disarm_timer(id);
        assert!(!drive_until(&engine, Duration::from_millis(50), || fired.get()));
    }

    #[test]
    fn test_rearming_replaces_previous_registration() {
        let engine = PollEngine::new().unwrap();
        let fired = Rc::new(Cell::new(0));
        let id = TimerId::allocate();
        let fired2 = Rc::clone(&fired);
        engine.arm_timer(id, Duration::from_secs(60), Box::new(move || fired2.set(1)));
        let fired3 = Rc::clone(&fired);
        engine.arm_timer(id, Duration::from_millis(5), Box::new(move || fired3.set(2)));
        assert!(drive_until(&engine, Duration::from_secs(2), || fired.get() != 0));
        assert_eq!(fired.get(), 2);
    }

    #[test]
    fn test_monitored_fd_handler_fires_and_can_be_removed() {
        let engine = Rc::new(PollEngine::new().unwrap());
        let mut fds = [0 as RawFd; 2];
        assert_eq!(unsafe { libc::pipe(fds.as_mut_ptr()) }, 0);
        let (read_fd, write_fd) = (fds[0], fds[1]);

        let seen = Rc::new(Cell::new(0u32));
        let seen2 = Rc::clone(&seen);
        engine.add_monitored_fd(
            read_fd,
            EVENT_IN,
            Box::new(move |readiness| {
                seen2.set(seen2.get() | readiness);
                let mut byte = [0u8; 16];
                unsafe { libc::read(read_fd, byte.as_mut_ptr().cast(), byte.len()) };
            }),
        );

        assert_eq!(unsafe { libc::write(write_fd, b"x".as_ptr().cast(), 1) }, 1);
        assert!(drive_until(&engine, Duration::from_secs(2), || seen.get() != 0));
        assert_eq!(seen.get() & EVENT_IN, EVENT_IN);

        engine.delete_monitored_fd(read_fd);
        seen.set(0);
        assert_eq!(unsafe { libc::write(write_fd, b"y".as_ptr().cast(), 1) }, 1);
        assert!(!drive_until(&engine, Duration::from_millis(50), || seen.get() != 0));

        unsafe {
            libc::close(read_fd);
            libc::close(write_fd);
        }
    }
}
