use std::cell::RefCell;
use std::rc::Rc;

use vtree_core::{Component, Content, HostHandle, Props, Scope, StateSetter, VNode, VNodeKind};
use vtree_testing::prelude::*;

#[test]
fn fragment_component_grows_before_its_next_sibling() {
    let slot: Rc<RefCell<Option<StateSetter<usize>>>> = Rc::default();
    let items = Component::new("Items", {
        let slot = Rc::clone(&slot);
        move |scope: &mut Scope<'_>, _: &Props| {
            let (count, set) = scope.use_state(|| 1usize);
            *slot.borrow_mut() = Some(set);
            (0..count)
                .map(|n| VNode::element("i").text_content(n.to_string()))
                .collect::<Vec<_>>()
        }
    });
    let mut rule = RenderTestRule::new();
    rule.set_content(VNode::element("div").children([
        VNode::text("["),
        items.node(Props::new()),
        VNode::text("]"),
    ]))
    .expect("mount");
    assert_eq!(rule.html(), "<div>[<i>0</i>]</div>");

    let set = slot.borrow().clone().expect("setter");
    set.set(3).expect("grow");
    rule.pump_until_idle().expect("pump");
    assert_eq!(rule.html(), "<div>[<i>0</i><i>1</i><i>2</i>]</div>");

    set.set(0).expect("shrink");
    rule.pump_until_idle().expect("pump");
    assert_eq!(rule.html(), "<div>[]</div>");
}

#[test]
fn empty_fragment_component_keeps_its_place_when_a_neighbour_swaps_roots() {
    let items_slot: Rc<RefCell<Option<StateSetter<usize>>>> = Rc::default();
    let badge_slot: Rc<RefCell<Option<StateSetter<bool>>>> = Rc::default();
    let items = Component::new("Items", {
        let slot = Rc::clone(&items_slot);
        move |scope: &mut Scope<'_>, _: &Props| {
            let (count, set) = scope.use_state(|| 0usize);
            *slot.borrow_mut() = Some(set);
            VNode::fragment((0..count).map(|n| VNode::element("i").text_content(n.to_string())))
        }
    });
    let badge = Component::new("Badge", {
        let slot = Rc::clone(&badge_slot);
        move |scope: &mut Scope<'_>, _: &Props| {
            let (wide, set) = scope.use_state(|| false);
            *slot.borrow_mut() = Some(set);
            VNode::element(if wide { "span" } else { "b" }).text_content("B")
        }
    });
    let mut rule = RenderTestRule::new();
    rule.set_content(VNode::element("div").children([
        VNode::text("["),
        items.node(Props::new()),
        badge.node(Props::new()),
        VNode::text("]"),
    ]))
    .expect("mount");
    assert_eq!(rule.html(), "<div>[<b>B</b>]</div>");

    badge_slot.borrow().clone().expect("badge").set(true).expect("swap");
    rule.pump_until_idle().expect("pump");
    assert_eq!(rule.html(), "<div>[<span>B</span>]</div>");

    items_slot.borrow().clone().expect("items").set(2).expect("grow");
    rule.pump_until_idle().expect("pump");
    assert_eq!(rule.html(), "<div>[<i>0</i><i>1</i><span>B</span>]</div>");
}

#[test]
fn keyed_fragment_components_move_all_their_nodes() {
    let entry = Component::new("Entry", |_: &mut Scope<'_>, props: &Props| {
        let term = props.str("term").unwrap_or_default();
        VNode::fragment([
            VNode::element("dt").text_content(term),
            VNode::element("dd").text_content(term.to_uppercase()),
        ])
    });
    let glossary = |terms: &[&str]| {
        VNode::element("dl").children(
            terms
                .iter()
                .map(|term| entry.node(Props::new().with("term", *term)).key(*term)),
        )
    };
    let mut rule = RenderTestRule::new();
    rule.set_content(glossary(&["a", "b", "c"])).expect("mount");
    rule.take_ops();

    rule.set_content(glossary(&["c", "b", "a"])).expect("reverse");
    assert_eq!(
        rule.html(),
        "<dl><dt>c</dt><dd>C</dd><dt>b</dt><dd>B</dd><dt>a</dt><dd>A</dd></dl>"
    );
    assert_eq!(rule.host().count("move"), 4);
    assert_eq!(rule.host().count("insert"), 0);
}

#[test]
fn nested_fragments_flatten_into_the_host() {
    let mut rule = RenderTestRule::new();
    rule.set_content(VNode::element("p").children([
        VNode::text("a"),
        VNode::fragment([
            VNode::text("b"),
            VNode::fragment([VNode::text("c"), VNode::text("d")]),
        ]),
        VNode::text("e"),
    ]))
    .expect("mount");
    assert_eq!(rule.html(), "<p>abcde</p>");
    let tree = rule.tree().expect("tree");
    assert_eq!(tree.host_nodes().len(), 1);

    rule.set_content(VNode::element("p").children([
        VNode::text("a"),
        VNode::fragment([VNode::fragment(Vec::new())]),
        VNode::text("e"),
    ]))
    .expect("patch");
    assert_eq!(rule.html(), "<p>ae</p>");
}

fn fragment_children(node: &VNode) -> &[VNode] {
    match node.kind() {
        VNodeKind::Element(el) => match &el.content {
            Content::Children(children) => children,
            other => panic!("expected children, got {other:?}"),
        },
        other => panic!("expected an element, got {other:?}"),
    }
}

#[test]
fn sibling_fragments_hand_over_their_childrens_nodes() {
    let words = |words: &[&str]| VNode::fragment(words.iter().map(|word| VNode::text(*word)));
    let tree = |left: &[&str], right: &[&str]| VNode::element("p").children([words(left), words(right)]);
    let mut rule = RenderTestRule::new();
    rule.set_content(tree(&["a", "b"], &["c"])).expect("mount");

    for (left, right) in [(&["a"][..], &["b", "c", "d"][..]), (&["e", "f"][..], &[][..])] {
        let p = rule.tree().and_then(VNode::element_id).expect("mounted p");
        let mut joined = Vec::new();
        for fragment in fragment_children(rule.tree().expect("tree")) {
            let VNodeKind::Fragment(inner) = fragment.kind() else {
                panic!("expected a fragment");
            };
            let expected: Vec<HostHandle> = inner.children.iter().map(VNode::host_handle).collect();
            assert_eq!(fragment.host_handle(), HostHandle::Fragment(expected));
            joined.extend(fragment.host_nodes());
        }
        assert_eq!(rule.host().memory().children(p), joined.as_slice());

        rule.set_content(tree(left, right)).expect("patch");
    }
    assert_eq!(rule.html(), "<p>ef</p>");
    let p = rule.tree().and_then(VNode::element_id).expect("mounted p");
    let joined: Vec<_> = fragment_children(rule.tree().expect("tree"))
        .iter()
        .flat_map(VNode::host_nodes)
        .collect();
    assert_eq!(rule.host().memory().children(p), joined.as_slice());
    assert_eq!(joined.len(), 2);
}
