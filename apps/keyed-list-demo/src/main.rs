use vtree_core::{Component, Listener, MemoryHost, NodeId, Props, RenderError, Scope, VNode, Value};
use vtree_runtime_std::StdRuntime;

const MAX_ROUNDS: usize = 16;

#[derive(Clone)]
struct Todo {
    id: u32,
    title: &'static str,
    done: bool,
}

enum TodoAction {
    Toggle(u32),
    Reverse,
    Add(&'static str),
}

fn reduce(todos: &Vec<Todo>, action: TodoAction) -> Vec<Todo> {
    let mut todos = todos.clone();
    match action {
        TodoAction::Toggle(id) => {
            if let Some(todo) = todos.iter_mut().find(|todo| todo.id == id) {
                todo.done = !todo.done;
            }
        }
        TodoAction::Reverse => todos.reverse(),
        TodoAction::Add(title) => {
            let id = todos.iter().map(|todo| todo.id).max().unwrap_or(0) + 1;
            todos.push(Todo {
                id,
                title,
                done: false,
            });
        }
    }
    todos
}

fn todo_app() -> Component {
    Component::new("TodoApp", |scope: &mut Scope<'_>, _: &Props| {
        let (todos, dispatch) = scope.use_reducer(reduce, || {
            ["write parser", "review diff", "ship release"]
                .into_iter()
                .zip(1..)
                .map(|(title, id)| Todo {
                    id,
                    title,
                    done: false,
                })
                .collect::<Vec<_>>()
        });
        let left = todos.iter().filter(|todo| !todo.done).count();
        scope.use_effect_with(left, move |_| log::info!("{left} todo(s) left"));

        let rows = todos.iter().map(|todo| {
            let id = todo.id;
            let dispatch = dispatch.clone();
            let class = if todo.done { "done" } else { "open" };
            VNode::element("li")
                .key(i64::from(id))
                .attr("class", class)
                .on(
                    "click",
                    Listener::new(move |_| {
                        if let Err(err) = dispatch.dispatch(TodoAction::Toggle(id)) {
                            log::error!("toggle failed: {err}");
                        }
                    }),
                )
                .text_content(todo.title)
        });
        let reverse = dispatch.clone();
        let add = dispatch.clone();
        VNode::element("section").children([
            VNode::element("button").attr("id", "reverse").on(
                "click",
                Listener::new(move |_| {
                    if let Err(err) = reverse.dispatch(TodoAction::Reverse) {
                        log::error!("reverse failed: {err}");
                    }
                }),
            ),
            VNode::element("button").attr("id", "add").on(
                "click",
                Listener::new(move |_| {
                    if let Err(err) = add.dispatch(TodoAction::Add("celebrate")) {
                        log::error!("add failed: {err}");
                    }
                }),
            ),
            VNode::element("ul").children(rows),
            VNode::element("p").text_content(format!("{left} left")),
        ])
    })
}

/// Walks `path` child indices down from `from`.
fn node_at(host: &MemoryHost, from: NodeId, path: &[usize]) -> Option<NodeId> {
    path.iter()
        .try_fold(from, |node, index| host.children(node).get(*index).copied())
}

fn click(host: &MemoryHost, root: NodeId, path: &[usize]) {
    match node_at(host, root, path) {
        Some(node) => {
            if !host.dispatch(node, "click", &Value::Null) {
                log::warn!("no click listener at {path:?}");
            }
        }
        None => log::warn!("nothing mounted at {path:?}"),
    }
}

fn main() -> Result<(), RenderError> {
    env_logger::init();

    println!("=== Keyed list demo ===");
    println!("Mounts a keyed todo list into an in-memory host and replays a few clicks.");
    println!();

    let runtime = StdRuntime::new();
    let mut host = MemoryHost::new();
    let root = host.create_root();
    let mut renderer = runtime.renderer(host).build();
    let app = todo_app();
    let _tree = renderer.mount(app.node(Props::new()), root)?;
    println!("mounted:  {}", renderer.host().inner_html(root));

    // section > ul > li
    click(renderer.host(), root, &[0, 2, 1]);
    let rounds = runtime.run_until_idle(&mut renderer, MAX_ROUNDS)?;
    println!("toggled:  {} ({rounds} flush)", renderer.host().inner_html(root));

    click(renderer.host(), root, &[0, 0]);
    click(renderer.host(), root, &[0, 1]);
    let rounds = runtime.run_until_idle(&mut renderer, MAX_ROUNDS)?;
    println!("reversed: {} ({rounds} flush)", renderer.host().inner_html(root));

    println!();
    print!("{}", renderer.host().dump_tree(Some(root)));
    Ok(())
}
