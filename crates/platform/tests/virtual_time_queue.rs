use mtk_platform::time::{Clock, TimerEvent, TimerQueue};
use pretty_assertions::assert_eq;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tag {
    A,
    B,
    C,
}

fn collect_events(
    clock: &mut Clock,
    queue: &mut TimerQueue<Tag>,
    steps: &[u64],
) -> Vec<(u64, Tag)> {
    let mut events = Vec::new();
    for &step in steps {
        let target = clock.now_ns() + step;
        while let Some(TimerEvent {
            deadline_ns,
            payload,
            ..
        }) = queue.pop_due(target)
        {
            clock.advance_to(deadline_ns);
            events.push((deadline_ns, payload));
        }
        clock.advance_to(target);
    }
    events
}

#[test]
fn step_size_does_not_change_delivery() {
    let schedule = |q: &mut TimerQueue<Tag>| {
        q.schedule(160, Tag::C);
        q.schedule(10, Tag::A);
        q.schedule(60, Tag::B);
        q.schedule(60, Tag::A);
    };

    let mut coarse_clock = Clock::new();
    let mut coarse = TimerQueue::new();
    schedule(&mut coarse);
    let coarse_events = collect_events(&mut coarse_clock, &mut coarse, &[1_000]);

    let mut fine_clock = Clock::new();
    let mut fine = TimerQueue::new();
    schedule(&mut fine);
    let fine_events = collect_events(&mut fine_clock, &mut fine, &[1; 1_000]);

    assert_eq!(
        coarse_events,
        vec![(10, Tag::A), (60, Tag::B), (60, Tag::A), (160, Tag::C)]
    );
    assert_eq!(fine_events, coarse_events);
    assert_eq!(coarse_clock.now_ns(), fine_clock.now_ns());
}

#[test]
fn clock_state_round_trip_resumes_delivery() {
    let mut clock = Clock::new();
    let mut queue = TimerQueue::new();
    queue.schedule(100, Tag::A);
    queue.schedule(300, Tag::B);
    collect_events(&mut clock, &mut queue, &[150]);
    let saved = clock.save_state();

    let mut restored = Clock::new();
    restored.restore_state(saved);
    assert_eq!(restored.now_ns(), 150);
    assert_eq!(
        collect_events(&mut restored, &mut queue, &[200]),
        vec![(300, Tag::B)]
    );
}
