use std::cell::RefCell;
use std::rc::Rc;

use vtree_core::{Component, Props, Scope, StateSetter, VNode};
use vtree_testing::prelude::*;

type Slot<T> = Rc<RefCell<Option<StateSetter<T>>>>;

fn captured<T: 'static>(slot: &Slot<T>) -> StateSetter<T> {
    slot.borrow().clone().expect("setter captured during render")
}

fn counter(name: &'static str, slot: &Slot<i64>) -> Component {
    let slot = Rc::clone(slot);
    Component::new(name, move |scope: &mut Scope<'_>, _: &Props| {
        let (count, set) = scope.use_state(|| 0i64);
        *slot.borrow_mut() = Some(set);
        VNode::element("b").text_content(count.to_string())
    })
}

#[test]
fn updates_across_components_share_one_flush() {
    let slots: Vec<Slot<i64>> = (0..3).map(|_| Slot::default()).collect();
    let counters: Vec<Component> = slots
        .iter()
        .map(|slot| counter("Counter", slot))
        .collect();
    let mut rule = RenderTestRule::new();
    rule.set_content(
        VNode::element("div").children(counters.iter().map(|counter| counter.node(Props::new()))),
    )
    .expect("mount");
    assert!(rule.is_idle());

    for (step, slot) in slots.iter().enumerate() {
        let set = captured(slot);
        set.set(step as i64 + 1).expect("set");
        set.update(|n| n * 10).expect("update");
    }
    assert!(!rule.is_idle());
    assert_eq!(rule.html(), "<div><b>0</b><b>0</b><b>0</b></div>");

    assert_eq!(rule.pump_until_idle().expect("pump"), 1);
    assert_eq!(rule.html(), "<div><b>10</b><b>20</b><b>30</b></div>");
    assert!(rule.is_idle());
}

#[test]
fn effect_updates_land_in_a_later_flush() {
    let sink_slot = Slot::<i64>::default();
    let source_slot = Slot::<i64>::default();
    let sink = counter("Sink", &sink_slot);
    let source = Component::new("Source", {
        let sink_slot = Rc::clone(&sink_slot);
        let source_slot = Rc::clone(&source_slot);
        move |scope: &mut Scope<'_>, _: &Props| {
            let (n, set) = scope.use_state(|| 0i64);
            *source_slot.borrow_mut() = Some(set);
            let sink_slot = Rc::clone(&sink_slot);
            scope.use_effect_with(n, move |_| {
                if n > 0 {
                    captured(&sink_slot).set(n * 100).expect("forward");
                }
            });
            VNode::element("i").text_content(n.to_string())
        }
    });
    let mut rule = RenderTestRule::new();
    rule.set_content(
        VNode::element("p").children([source.node(Props::new()), sink.node(Props::new())]),
    )
    .expect("mount");

    captured(&source_slot).set(2).expect("set");
    assert_eq!(rule.pump_until_idle().expect("pump"), 2);
    assert_eq!(rule.html(), "<p><i>2</i><b>200</b></p>");
}

#[test]
fn held_removals_detach_on_release() {
    let held = HeldRemovals::new();
    let mut rule = RenderTestRule::with_modules(vec![Box::new(held.clone())]);
    rule.set_content(
        VNode::element("ul").children(["a", "b"].map(|key| VNode::element("li").key(key).text_content(key))),
    )
    .expect("mount");

    rule.set_content(VNode::element("ul").child(VNode::element("li").key("a").text_content("a")))
        .expect("patch");
    assert_eq!(held.len(), 1);
    assert_eq!(rule.html(), "<ul><li>a</li><li>b</li></ul>");
    assert!(rule.is_idle());

    assert_eq!(held.release_all(), 1);
    assert!(!rule.is_idle());
    rule.pump_until_idle().expect("pump");
    assert_eq!(rule.html(), "<ul><li>a</li></ul>");
    assert!(held.is_empty());
}
