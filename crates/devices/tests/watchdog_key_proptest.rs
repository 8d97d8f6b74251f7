use mtk_devices::watchdog::{WDT_LENGTH_KEY, WDT_MODE_KEY};
use mtk_devices::{DeviceTimer, MtkWatchdog, WdtMode};
use mtk_platform::time::{TimerQueue, NANOS_PER_SEC};
use proptest::prelude::*;

fn snapshot(wdt: &MtkWatchdog) -> (WdtMode, u32, u32, Option<u64>, Option<u64>) {
    (
        wdt.mode(),
        wdt.timeout_raw(),
        wdt.pretimeout_secs(),
        wdt.primary_deadline_ns(),
        wdt.pretimeout_deadline_ns(),
    )
}

fn armed(q: &mut TimerQueue<DeviceTimer>, dual: bool) -> MtkWatchdog {
    let mut wdt = MtkWatchdog::detached();
    wdt.mmio_write(0x04, 4, u64::from((7 << 11) | WDT_LENGTH_KEY), 0, q);
    let mut bits = WdtMode::ENABLE;
    if dual {
        bits |= WdtMode::DUAL_ENABLE;
    }
    wdt.mmio_write(0x00, 4, u64::from(WDT_MODE_KEY | bits.bits()), 0, q);
    wdt
}

proptest! {
    #[test]
    fn mode_writes_without_key_change_nothing(
        value in any::<u32>().prop_filter("must not carry the key", |v| v & 0xFF00_0000 != WDT_MODE_KEY),
        dual in any::<bool>(),
        now in 0u64..(10 * NANOS_PER_SEC),
    ) {
        let mut q = TimerQueue::new();
        let mut wdt = armed(&mut q, dual);
        let before = snapshot(&wdt);

        wdt.mmio_write(0x00, 4, u64::from(value), now, &mut q);

        prop_assert_eq!(snapshot(&wdt), before);
        prop_assert_eq!(q.len(), if dual { 2 } else { 1 });
    }

    #[test]
    fn length_writes_without_key_change_nothing(
        value in any::<u32>().prop_filter("must not carry the key", |v| v & WDT_LENGTH_KEY == 0),
        dual in any::<bool>(),
    ) {
        let mut q = TimerQueue::new();
        let mut wdt = armed(&mut q, dual);
        let before = snapshot(&wdt);

        wdt.mmio_write(0x04, 4, u64::from(value), NANOS_PER_SEC, &mut q);

        prop_assert_eq!(snapshot(&wdt), before);
    }

    #[test]
    fn enabling_schedules_per_decoded_timeout(
        secs in 0u32..=(u32::MAX >> 11),
        low in 0u32..0x800,
        dual in any::<bool>(),
        now in 0u64..(1u64 << 40),
    ) {
        let raw = (secs << 11) | (low & 0x7FF) | WDT_LENGTH_KEY;
        let mut q = TimerQueue::new();
        let mut wdt = MtkWatchdog::detached();
        wdt.mmio_write(0x04, 4, u64::from(raw), 0, &mut q);
        let mut bits = WdtMode::ENABLE;
        if dual {
            bits |= WdtMode::DUAL_ENABLE;
        }
        wdt.mmio_write(0x00, 4, u64::from(WDT_MODE_KEY | bits.bits()), now, &mut q);

        let t = u64::from(secs) * NANOS_PER_SEC;
        if dual {
            prop_assert_eq!(wdt.pretimeout_deadline_ns(), Some(now + t));
            prop_assert_eq!(wdt.primary_deadline_ns(), Some(now + 2 * t));
        } else {
            prop_assert_eq!(wdt.pretimeout_deadline_ns(), None);
            prop_assert_eq!(wdt.primary_deadline_ns(), Some(now + t));
        }
    }
}
