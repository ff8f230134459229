use super::*;
use crate::context::ContextObserver;
use crate::error::RenderError;
use crate::hooks::{Scope, StateSetter};
use crate::host::MemoryHost;
use crate::patch::Renderer;
use crate::runtime::TestScheduler;
use crate::vnode::{Content, Props, VNode, VNodeKind};
use crate::NodeId;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;

type SetterSlot = Rc<RefCell<Option<StateSetter<i64>>>>;

fn setup() -> (Renderer<MemoryHost>, NodeId) {
    let mut host = MemoryHost::new();
    let root = host.create_root();
    let renderer = Renderer::builder(host)
        .scheduler(Arc::new(TestScheduler))
        .build();
    (renderer, root)
}

fn captured(slot: &SetterSlot) -> StateSetter<i64> {
    slot.borrow().clone().expect("setter captured during render")
}

/// Renders `<span>{label}:{count}</span>` and leaks its setter.
fn counter(slot: &SetterSlot) -> Component {
    let slot = Rc::clone(slot);
    Component::new("Counter", move |scope: &mut Scope<'_>, props: &Props| {
        let (count, set) = scope.use_state(|| 0i64);
        *slot.borrow_mut() = Some(set);
        let label = props.str("label").unwrap_or("n").to_string();
        VNode::element("span").text_content(format!("{label}:{count}"))
    })
}

#[test]
fn render_phase_updates_restart_the_render() {
    let runs = Rc::new(Cell::new(0));
    let converge = Component::new("Converge", {
        let runs = Rc::clone(&runs);
        move |scope: &mut Scope<'_>, _: &Props| {
            runs.set(runs.get() + 1);
            let (n, set) = scope.use_state(|| 0i64);
            if n < 3 {
                set.set(n + 1).expect("render-phase update");
            }
            VNode::text(n.to_string())
        }
    });
    let (mut renderer, root) = setup();
    let tree = renderer
        .mount(converge.node(Props::new()), root)
        .expect("mount");

    assert_eq!(runs.get(), 4);
    assert_eq!(renderer.host().inner_html(root), "3");
    let instance = tree.instance().expect("instance");
    assert_eq!(instance.render_count(), 4);
    assert_eq!(instance.commit_count(), 1);
    assert!(!renderer.needs_flush());
}

#[test]
fn runaway_render_fails_after_the_limit() {
    let runs = Rc::new(Cell::new(0));
    let runaway = Component::new("Runaway", {
        let runs = Rc::clone(&runs);
        move |scope: &mut Scope<'_>, _: &Props| {
            runs.set(runs.get() + 1);
            let (n, set) = scope.use_state(|| 0i64);
            set.set(n + 1).expect("render-phase update");
            VNode::text("never")
        }
    });
    let (mut renderer, root) = setup();
    let err = renderer
        .mount(runaway.node(Props::new()), root)
        .expect_err("runaway render");

    match err {
        RenderError::TooManyReRenders {
            component,
            attempts,
        } => {
            assert_eq!(component, "Runaway");
            assert_eq!(attempts, RE_RENDER_LIMIT + 1);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(runs.get(), RE_RENDER_LIMIT);
    assert_eq!(renderer.host().inner_html(root), "");
}

#[test]
fn returning_nothing_is_an_error() {
    let silent = Component::new("Silent", |_: &mut Scope<'_>, _: &Props| {});
    let (mut renderer, root) = setup();
    let err = renderer
        .mount(silent.node(Props::new()), root)
        .expect_err("nothing returned");
    assert!(matches!(
        err,
        RenderError::NothingReturned {
            component: "Silent"
        }
    ));
}

#[test]
fn adjacent_roots_are_wrapped_in_a_fragment() {
    let pair = Component::new("Pair", |_: &mut Scope<'_>, _: &Props| {
        vec![VNode::text("a"), VNode::element("b").text_content("c")]
    });
    let (mut renderer, root) = setup();
    renderer.mount(pair.node(Props::new()), root).expect("mount");
    assert_eq!(renderer.host().inner_html(root), "a<b>c</b>");
}

#[test]
fn text_render_becomes_a_text_node() {
    let greeting = Component::new("Greeting", |_: &mut Scope<'_>, props: &Props| {
        format!("hello {}", props.str("name").unwrap_or("world"))
    });
    let (mut renderer, root) = setup();
    renderer
        .mount(greeting.node(Props::new().with("name", "vtree")), root)
        .expect("mount");
    assert_eq!(renderer.host().inner_html(root), "hello vtree");
}

#[test]
fn empty_render_keeps_its_place_among_siblings() {
    let slot: Rc<RefCell<Option<StateSetter<bool>>>> = Rc::default();
    let toggle = Component::new("Toggle", {
        let slot = Rc::clone(&slot);
        move |scope: &mut Scope<'_>, _: &Props| {
            let (on, set) = scope.use_state(|| false);
            *slot.borrow_mut() = Some(set);
            on.then(|| VNode::element("em").text_content("on"))
        }
    });
    let (mut renderer, root) = setup();
    renderer
        .mount(
            VNode::element("ul").children([
                VNode::element("li").text_content("first"),
                toggle.node(Props::new()),
                VNode::element("li").text_content("last"),
            ]),
            root,
        )
        .expect("mount");
    assert_eq!(
        renderer.host().inner_html(root),
        "<ul><li>first</li><li>last</li></ul>"
    );

    let set = slot.borrow().clone().expect("setter");
    set.set(true).expect("update");
    renderer.flush().expect("flush");
    assert_eq!(
        renderer.host().inner_html(root),
        "<ul><li>first</li><em>on</em><li>last</li></ul>"
    );
}

#[test]
fn updates_before_a_flush_share_one_commit() {
    let slot = SetterSlot::default();
    let component = counter(&slot);
    let (mut renderer, root) = setup();
    let tree = renderer
        .mount(component.node(Props::new()), root)
        .expect("mount");
    let instance = tree.instance().expect("instance").clone();
    assert_eq!((instance.render_count(), instance.commit_count()), (1, 1));

    let set = captured(&slot);
    set.set(1).expect("first update");
    set.update(|n| n + 1).expect("second update");
    assert_eq!(instance.render_count(), 3);
    assert_eq!(instance.commit_count(), 1);
    assert!(instance.has_pending());
    assert!(renderer.needs_flush());
    assert_eq!(renderer.host().inner_html(root), "<span>n:0</span>");

    renderer.flush().expect("flush");
    assert_eq!(instance.commit_count(), 2);
    assert_eq!(renderer.host().inner_html(root), "<span>n:2</span>");
    assert!(!renderer.needs_flush());
    assert!(!renderer.runtime().has_pending_commits());

    renderer.flush().expect("idle flush");
    assert_eq!(instance.commit_count(), 2);
}

#[test]
fn synchronous_patch_supersedes_a_queued_commit() {
    let slot = SetterSlot::default();
    let component = counter(&slot);
    let (mut renderer, root) = setup();
    let tree = renderer
        .mount(component.node(Props::new().with("label", "a")), root)
        .expect("mount");
    let instance = tree.instance().expect("instance").clone();

    captured(&slot).set(5).expect("update");
    let tree = renderer
        .patch(tree, component.node(Props::new().with("label", "b")), root)
        .expect("patch");
    assert_eq!(renderer.host().inner_html(root), "<span>b:5</span>");
    assert_eq!(instance.commit_count(), 2);
    assert!(tree.instance().expect("instance").id() == instance.id());

    renderer.flush().expect("flush");
    assert_eq!(instance.commit_count(), 2);
    assert_eq!(renderer.host().inner_html(root), "<span>b:5</span>");
}

#[test]
fn update_now_commits_immediately() {
    let slot = SetterSlot::default();
    let component = counter(&slot);
    let (mut renderer, root) = setup();
    let tree = renderer
        .mount(component.node(Props::new()), root)
        .expect("mount");
    let instance = tree.instance().expect("instance").clone();

    captured(&slot).set(3).expect("update");
    renderer.update_now(&instance).expect("update now");
    assert_eq!(renderer.host().inner_html(root), "<span>n:3</span>");
    assert_eq!(instance.commit_count(), 2);

    renderer.flush().expect("flush");
    assert_eq!(instance.commit_count(), 2);
}

#[test]
fn async_commit_replaces_root_in_place() {
    let slot = SetterSlot::default();
    let swap = Component::new("Swap", {
        let slot = Rc::clone(&slot);
        move |scope: &mut Scope<'_>, _: &Props| {
            let (n, set) = scope.use_state(|| 0i64);
            *slot.borrow_mut() = Some(set);
            let tag = if n % 2 == 0 { "span" } else { "em" };
            VNode::element(tag).text_content(n.to_string())
        }
    });
    let (mut renderer, root) = setup();
    renderer
        .mount(
            VNode::element("p").children([
                VNode::text("<"),
                swap.node(Props::new()),
                VNode::text(">"),
            ]),
            root,
        )
        .expect("mount");

    captured(&slot).set(1).expect("update");
    renderer.flush().expect("flush");
    assert_eq!(renderer.host().inner_html(root), "<p><<em>1</em>></p>");

    captured(&slot).set(2).expect("update");
    renderer.flush().expect("flush");
    assert_eq!(renderer.host().inner_html(root), "<p><<span>2</span>></p>");
}

#[test]
fn unmounted_instances_ignore_updates() {
    let slot = SetterSlot::default();
    let component = counter(&slot);
    let (mut renderer, root) = setup();
    let tree = renderer
        .mount(component.node(Props::new()), root)
        .expect("mount");
    let instance = tree.instance().expect("instance").clone();
    let handle = instance.handle();
    assert!(handle.is_mounted());

    renderer.unmount(tree).expect("unmount");
    assert!(instance.is_destroyed());
    assert!(!handle.is_mounted());
    assert_eq!(renderer.host().inner_html(root), "");

    captured(&slot).set(9).expect("ignored update");
    assert_eq!(instance.render_count(), 1);
    assert!(!renderer.needs_flush());
}

#[test]
fn handle_dispatch_applies_a_reducer() {
    let slot = SetterSlot::default();
    let component = counter(&slot);
    let (mut renderer, root) = setup();
    let tree = renderer
        .mount(component.node(Props::new()), root)
        .expect("mount");
    let handle = tree.instance().expect("instance").handle();

    handle
        .dispatch(0, |n: &i64, by: i64| n + by, 5)
        .expect("dispatch");
    renderer.flush().expect("flush");
    assert_eq!(renderer.host().inner_html(root), "<span>n:5</span>");

    handle
        .dispatch(0, |s: &String, _: ()| s.clone(), ())
        .expect("mismatched dispatch is ignored");
    assert!(!renderer.needs_flush());
}

#[test]
fn force_update_rerenders_without_state_changes() {
    let slot = SetterSlot::default();
    let component = counter(&slot);
    let (mut renderer, root) = setup();
    let tree = renderer
        .mount(component.node(Props::new()), root)
        .expect("mount");
    let instance = tree.instance().expect("instance").clone();

    instance.handle().force_update().expect("force update");
    assert_eq!(instance.render_count(), 2);
    renderer.flush().expect("flush");
    assert_eq!(instance.commit_count(), 2);
}

#[test]
fn children_and_attributes_reach_props() {
    let layout = Component::new("Layout", |_: &mut Scope<'_>, props: &Props| {
        VNode::element("section")
            .attr("title", props.str("title").unwrap_or_default().to_string())
            .children(props.children().to_vec())
    });
    let (mut renderer, root) = setup();
    renderer
        .mount(
            layout
                .node(Props::new())
                .attr("title", "t")
                .children([VNode::text("x"), VNode::element("hr")]),
            root,
        )
        .expect("mount");
    assert_eq!(
        renderer.host().inner_html(root),
        "<section title=\"t\">x<hr></hr></section>"
    );
}

#[derive(Default)]
struct Unmounts {
    ids: RefCell<Vec<InstanceId>>,
}

impl ContextObserver for Unmounts {
    fn instance_unmounted(&self, id: InstanceId) {
        self.ids.borrow_mut().push(id);
    }
}

#[test]
fn observer_hears_descendants_first() {
    let child = Component::new("Child", |_: &mut Scope<'_>, _: &Props| VNode::element("i"));
    let parent = Component::new("Parent", {
        let child = child.clone();
        move |_: &mut Scope<'_>, _: &Props| VNode::element("div").child(child.node(Props::new()))
    });
    let observer = Rc::new(Unmounts::default());
    let mut host = MemoryHost::new();
    let root = host.create_root();
    let mut renderer = Renderer::builder(host)
        .scheduler(Arc::new(TestScheduler))
        .observer(observer.clone())
        .build();
    let tree = renderer.mount(parent.node(Props::new()), root).expect("mount");
    let parent_id = tree.instance().expect("parent").id();
    assert_eq!(renderer.host().inner_html(root), "<div><i></i></div>");

    renderer.unmount(tree).expect("unmount");
    let ids = observer.ids.borrow();
    assert_eq!(ids.len(), 2);
    assert_eq!(ids[1], parent_id);
    assert_ne!(ids[0], parent_id);
}

#[test]
fn instance_ids_are_unique() {
    let component = Component::new("Leaf", |_: &mut Scope<'_>, _: &Props| VNode::element("i"));
    let (mut renderer, root) = setup();
    let tree = renderer
        .mount(
            VNode::element("div").children([component.node(Props::new()), component.node(Props::new())]),
            root,
        )
        .expect("mount");
    let VNodeKind::Element(el) = tree.kind() else {
        panic!("expected an element");
    };
    let Content::Children(children) = &el.content else {
        panic!("expected children");
    };
    let first = children[0].instance().expect("first").id();
    let second = children[1].instance().expect("second").id();
    assert_ne!(first, second);
}
