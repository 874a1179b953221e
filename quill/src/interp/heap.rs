use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;
use std::time::Instant;

use super::env::EnvRef;
use super::object::Object;
use super::table::{self, Table};
use super::value::{ObjId, Value};

/// Collections never fire below this many live objects.
const GC_MIN_THRESHOLD: usize = 256;

/// Slot arena for heap objects, with a mark-and-sweep collector.
///
/// Every object occupies exactly one slot from allocation until sweep; a
/// [`Value::Obj`] handle is the slot index, so object identity is handle
/// equality. Swept slots go on a free list and are reused by later
/// allocations. The heap never starts a collection on its own:
/// [`should_collect`](Heap::should_collect) tells the interpreter when to
/// call [`collect`](Heap::collect), which keeps every live value visible
/// through the interpreter's root registries at mark time.
///
/// The heap is also the context handed to builtin functions, so it carries
/// the pieces of host state they touch: the output sink (stdout, or a
/// capture buffer under test) and the session start time for `clock()`.
#[derive(Debug)]
pub struct Heap {
    slots: Vec<Option<Object>>,
    marked: Vec<bool>,
    free: Vec<ObjId>,
    live: usize,
    threshold: usize,
    out: Option<Rc<RefCell<String>>>,
    start: Instant,
}

impl Heap {
    pub fn new() -> Heap {
        Heap {
            slots: Vec::new(),
            marked: Vec::new(),
            free: Vec::new(),
            live: 0,
            threshold: GC_MIN_THRESHOLD,
            out: None,
            start: Instant::now(),
        }
    }

    pub fn live(&self) -> usize {
        self.live
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn should_collect(&self) -> bool {
        self.live >= self.threshold
    }

    /// Place an object in a vacant slot and hand back its value.
    pub fn alloc(&mut self, object: Object) -> Value {
        self.live += 1;
        let id = match self.free.pop() {
            Some(id) => {
                self.slots[id] = Some(object);
                id
            }
            None => {
                self.slots.push(Some(object));
                self.marked.push(false);
                self.slots.len() - 1
            }
        };
        Value::Obj(id)
    }

    pub fn alloc_str(&mut self, text: String) -> Value {
        let hash = table::hash_key(&text);
        self.alloc(Object::Str { text, hash })
    }

    pub fn alloc_list(&mut self, items: Vec<Value>) -> Value {
        self.alloc(Object::List(items))
    }

    pub fn alloc_dict(&mut self, table: Table) -> Value {
        self.alloc(Object::Dict(table))
    }

    pub fn get(&self, id: ObjId) -> &Object {
        match &self.slots[id] {
            Some(object) => object,
            None => panic!("heap: access to swept slot {id}"),
        }
    }

    pub fn get_mut(&mut self, id: ObjId) -> &mut Object {
        match &mut self.slots[id] {
            Some(object) => object,
            None => panic!("heap: access to swept slot {id}"),
        }
    }

    /// Redirect `print`/`println` into a buffer and hand it back.
    pub fn capture_output(&mut self) -> Rc<RefCell<String>> {
        let buffer = Rc::new(RefCell::new(String::new()));
        self.out = Some(buffer.clone());
        buffer
    }

    pub fn write_out(&mut self, text: &str) {
        match &self.out {
            Some(buffer) => buffer.borrow_mut().push_str(text),
            None => {
                print!("{text}");
                let _ = io::stdout().flush();
            }
        }
    }

    /// Seconds since the heap was created, i.e. since interpreter startup.
    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }

    /// Full mark-and-sweep pass. Marks everything reachable from the given
    /// environment chains and loose values, frees the rest, and doubles the
    /// threshold over the surviving population. Returns how many objects
    /// were freed.
    pub fn collect(&mut self, env_roots: &[EnvRef], value_roots: &[Value]) -> usize {
        let mut worklist: Vec<ObjId> = Vec::new();
        for env in env_roots {
            self.mark_env(env, &mut worklist);
        }
        for value in value_roots {
            self.mark_value(*value, &mut worklist);
        }
        self.trace(&mut worklist);
        self.sweep()
    }

    /// Teardown: free every slot unconditionally.
    pub fn sweep_all(&mut self) {
        for flag in &mut self.marked {
            *flag = false;
        }
        self.sweep();
    }

    /// Record a value as reachable. Unmarked objects go on the worklist for
    /// later expansion; marked ones are skipped, which is what terminates
    /// tracing through cycles.
    fn mark_value(&mut self, value: Value, worklist: &mut Vec<ObjId>) {
        if let Value::Obj(id) = value {
            if !self.marked[id] {
                self.marked[id] = true;
                worklist.push(id);
            }
        }
    }

    /// Mark every binding along an environment chain.
    fn mark_env(&mut self, env: &EnvRef, worklist: &mut Vec<ObjId>) {
        let mut current = Some(env.clone());
        while let Some(env) = current {
            let frame = env.borrow();
            for value in frame.bindings().values() {
                self.mark_value(*value, worklist);
            }
            current = frame.parent().cloned();
        }
    }

    /// Expand the worklist until every structurally reachable object is
    /// marked. Children are gathered first so the arena borrow ends before
    /// marking resumes.
    fn trace(&mut self, worklist: &mut Vec<ObjId>) {
        let mut children: Vec<Value> = Vec::new();
        let mut envs: Vec<EnvRef> = Vec::new();
        while let Some(id) = worklist.pop() {
            children.clear();
            envs.clear();
            match self.get(id) {
                Object::Str { .. } | Object::Native { .. } => {}
                Object::List(items) => children.extend(items.iter().copied()),
                Object::Dict(table) => {
                    children.extend(table.iter().map(|(_, v)| v));
                }
                Object::Function { closure, .. } => envs.push(closure.clone()),
                Object::Class { ctor, methods, .. } => {
                    if let Some(ctor) = ctor {
                        children.push(Value::Obj(*ctor));
                    }
                    children.extend(methods.iter().map(|(_, v)| v));
                }
                Object::Instance { class, fields } => {
                    children.push(Value::Obj(*class));
                    children.extend(fields.iter().map(|(_, v)| v));
                }
            }
            for value in children.drain(..) {
                self.mark_value(value, worklist);
            }
            for env in envs.drain(..) {
                self.mark_env(&env, worklist);
            }
        }
    }

    fn sweep(&mut self) -> usize {
        let mut freed = 0;
        for id in 0..self.slots.len() {
            if self.slots[id].is_none() {
                continue;
            }
            if self.marked[id] {
                self.marked[id] = false;
            } else {
                self.slots[id] = None;
                self.free.push(id);
                freed += 1;
            }
        }
        self.live -= freed;
        self.threshold = (self.live * 2).max(GC_MIN_THRESHOLD);
        freed
    }
}

impl Default for Heap {
    fn default() -> Heap {
        Heap::new()
    }
}
