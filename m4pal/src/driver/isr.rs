use core::sync::atomic::Ordering;

use crate::util::measurement;

use super::{acquire_hw, LINE, SESSION};

/// Line timer interrupt entry point. The application must call this from its
/// `TIM4` handler.
pub fn tim4_pal_isr() {
    measurement::sig_a_set();

    let mut session = acquire_hw(&SESSION);
    session.on_expiry();
    LINE.store(session.line().index(), Ordering::Relaxed);
    drop(session);

    measurement::sig_a_clear();
}
