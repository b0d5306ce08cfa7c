#![no_main]

use aicebreaker_client::dispatcher::{Dispatch, RoundState};
use aicebreaker_client::reactor::{CountdownReactor, Side};
use aicebreaker_client::{parse_inbound, Inbound};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Channel payloads are text frames; invalid UTF-8 never reaches the parser.
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    let inbound = parse_inbound(text);
    if let Inbound::LegacyCountdown(value) = &inbound {
        assert!(*value >= 0);
    }

    let mut state = RoundState::default();
    let dispatched = state.apply(inbound);

    // Feeding the same value twice must never fire effects the second time.
    if let Dispatch::Countdown(value) = dispatched {
        assert_eq!(state.countdown, Some(value));
        let mut reactor = CountdownReactor::new(Side::Player);
        let _ = reactor.observe(Some(value));
        assert!(reactor.observe(Some(value)).is_empty());
    }
});
