use dix::{inject_methods, Container, ErrorKind, Multiplicity, Options, Record, TypeInfo};
use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicU8, Ordering},
        Arc,
    },
};
use tracing_test::traced_test;

struct Config {
    prefix: &'static str,
}

#[derive(Debug, PartialEq)]
struct Handler(&'static str);

#[derive(Debug)]
struct Fault {
    msg: &'static str,
}

struct A;
struct B;
struct C;
struct D;

#[test]
#[traced_test]
fn test_basic_singular() {
    let container = Container::new();
    container.provide(|| Arc::new(Config { prefix: "a" })).unwrap();

    let mut prefix = None;
    container
        .inject(|config: Arc<Config>| {
            prefix = Some(config.prefix);
        })
        .unwrap();

    assert_eq!(prefix, Some("a"));
}

#[test]
#[traced_test]
fn test_last_writer_singular_full_listed() {
    let container = Container::new();
    container.provide(|| Arc::new(Handler("hello"))).unwrap();
    container.provide(|| Arc::new(Handler("world"))).unwrap();

    let mut seen = None;
    container
        .inject(|handler: Arc<Handler>, handlers: Vec<Arc<Handler>>| {
            seen = Some((handler, handlers));
        })
        .unwrap();

    let (handler, handlers) = seen.unwrap();
    assert_eq!(*handler, Handler("world"));
    assert_eq!(
        handlers.iter().map(|handler| handler.0).collect::<Vec<_>>(),
        ["hello", "world"]
    );
    assert!(Arc::ptr_eq(&handler, &handlers[1]));
}

#[test]
#[traced_test]
fn test_keyed_map() {
    let container = Container::new();
    container
        .provide(|| {
            BTreeMap::from([
                (String::new(), Arc::new(Fault { msg: "default" })),
                ("hello".to_owned(), Arc::new(Fault { msg: "hello" })),
            ])
        })
        .unwrap();

    let mut seen = None;
    container
        .inject(|fault: Arc<Fault>, faults: BTreeMap<String, Arc<Fault>>| {
            seen = Some((fault, faults));
        })
        .unwrap();

    let (fault, faults) = seen.unwrap();
    assert_eq!(fault.msg, "default");
    assert_eq!(faults.len(), 2);
    assert_eq!(faults["default"].msg, "default");
    assert_eq!(faults["hello"].msg, "hello");
}

#[test]
#[traced_test]
fn test_blank_keys_collapse_into_default_group() {
    let container = Container::new();
    container
        .provide(|| BTreeMap::from([("  ".to_owned(), Arc::new(Fault { msg: "blank" }))]))
        .unwrap();

    let faults = container.get::<BTreeMap<String, Arc<Fault>>>().unwrap();
    assert_eq!(faults.keys().collect::<Vec<_>>(), ["default"]);
}

// `C` depends on `D`, but `D` has no provider and sits outside the loop,
// so the path holds `A`, `B` and `C` only and never `D`
#[test]
#[traced_test]
fn test_cycle_rejection() {
    let container = Container::new();
    container.provide(|_: Arc<B>| Arc::new(A)).unwrap();
    container.provide(|_: Arc<C>| Arc::new(B)).unwrap();
    container.provide(|_: Arc<D>| Arc::new(C)).unwrap();

    let err = container.provide(|_: Arc<A>| Arc::new(C)).unwrap_err();
    let ErrorKind::Cyclic { path } = err.kind() else {
        panic!("unexpected error: {err}");
    };
    for type_info in [TypeInfo::of::<Arc<A>>(), TypeInfo::of::<Arc<B>>(), TypeInfo::of::<Arc<C>>()] {
        assert_eq!(path.types().iter().filter(|member| **member == type_info).count(), 1);
    }

    // Rolled back, the rest of the graph still resolves once `D` is known
    container.provide(|| Arc::new(D)).unwrap();
    container.get::<Arc<A>>().unwrap();
}

#[derive(Record)]
struct Conf {
    a: Arc<Hello<A>>,
    b: Arc<Hello<B>>,
}

struct Hello<T> {
    hello: &'static str,
    _marker: std::marker::PhantomData<T>,
}

impl<T> Hello<T> {
    fn new(hello: &'static str) -> Self {
        Self {
            hello,
            _marker: std::marker::PhantomData,
        }
    }
}

#[test]
#[traced_test]
fn test_record_output_destructuring() {
    let call_count = Arc::new(AtomicU8::new(0));

    let container = Container::new();
    container
        .provide({
            let call_count = call_count.clone();
            move || {
                call_count.fetch_add(1, Ordering::SeqCst);
                Conf {
                    a: Arc::new(Hello::new("a")),
                    b: Arc::new(Hello::new("b")),
                }
            }
        })
        .unwrap();

    let mut seen = None;
    container
        .inject(|a: Arc<Hello<A>>, b: Arc<Hello<B>>| {
            seen = Some((a.hello, b.hello));
        })
        .unwrap();

    assert_eq!(seen, Some(("a", "b")));
    assert_eq!(call_count.load(Ordering::SeqCst), 1);
}

#[derive(Default, Record)]
#[dix(methods)]
struct FaultHandler {
    calls: usize,
    #[dix(skip)]
    last: Option<&'static str>,
}

#[inject_methods]
impl FaultHandler {
    fn dix_inject_a(&mut self, fault: Arc<Fault>) {
        self.calls += 1;
        self.last = Some(fault.msg);
    }

    #[allow(dead_code)]
    fn handle(&self) -> usize {
        self.calls
    }
}

#[test]
#[traced_test]
fn test_prefixed_method_injection() {
    let container = Container::new();
    container.provide(|| Arc::new(Fault { msg: "boom" })).unwrap();

    let mut handler = FaultHandler::default();
    container.inject(&mut handler).unwrap();

    assert_eq!(handler.calls, 1);
    assert_eq!(handler.last, Some("boom"));
}

#[test]
#[traced_test]
fn test_single_evaluation_and_identity() {
    let call_count = Arc::new(AtomicU8::new(0));

    let container = Container::new();
    container
        .provide({
            let call_count = call_count.clone();
            move || {
                call_count.fetch_add(1, Ordering::SeqCst);
                Arc::new(Handler("once"))
            }
        })
        .unwrap();

    let first = container.get::<Arc<Handler>>().unwrap();
    let second = container.get::<Arc<Handler>>().unwrap();
    let listed = container.get::<Vec<Arc<Handler>>>().unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert!(Arc::ptr_eq(&first, &listed[0]));
    assert_eq!(call_count.load(Ordering::SeqCst), 1);
}

#[test]
#[traced_test]
fn test_listed_without_providers() {
    let container = Container::new();

    let err = container.get::<Vec<Arc<Handler>>>().unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::NotFound { .. }));

    let handlers = container
        .get_with::<Vec<Arc<Handler>>>(Options::default().allow_values_null(true))
        .unwrap();
    assert!(handlers.is_empty());
}

#[test]
#[traced_test]
fn test_null_output_is_skipped() {
    let container = Container::new();
    container.provide(|| Option::<Arc<Handler>>::None).unwrap();

    let err = container.get::<Arc<Handler>>().unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::NotFound { .. }));

    let handler = container
        .get_with::<Option<Arc<Handler>>>(Options::default().allow_values_null(true))
        .unwrap();
    assert!(handler.is_none());
}

#[test]
#[traced_test]
fn test_provider_failure_is_an_invocation_error() {
    let container = Container::new();
    container
        .provide(|| Err::<Arc<Handler>, _>(anyhow::anyhow!("database is down")))
        .unwrap();

    let err = container.inject(|_: Arc<Handler>| {}).err().unwrap();
    let ErrorKind::Invocation { type_info, .. } = err.kind() else {
        panic!("unexpected error: {err}");
    };
    assert_eq!(*type_info, TypeInfo::of::<Arc<Handler>>());
    assert_eq!(err.cause().unwrap().to_string(), "database is down");
}

#[test]
#[traced_test]
fn test_target_failure_is_surfaced() {
    let container = Container::new();
    container.provide(|| Arc::new(Handler("hello"))).unwrap();

    let err = container
        .inject(|_: Arc<Handler>| {
            Err::<(), _>(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "rejected"))
        })
        .err()
        .unwrap();
    assert!(matches!(err.kind(), ErrorKind::Invocation { .. }));

    let cause = err.cause().and_then(|cause| cause.downcast_ref::<std::io::Error>()).unwrap();
    assert_eq!(cause.kind(), std::io::ErrorKind::PermissionDenied);
    assert_eq!(cause.to_string(), "rejected");
}

#[test]
#[traced_test]
fn test_keyed_without_providers() {
    let container = Container::new();

    let err = container.get::<BTreeMap<String, Arc<Fault>>>().unwrap_err();
    assert!(matches!(
        err.kind(),
        ErrorKind::NotFound {
            multiplicity: Multiplicity::Keyed,
            ..
        }
    ));
    let err = container.get::<BTreeMap<String, Vec<Arc<Fault>>>>().unwrap_err();
    assert!(matches!(
        err.kind(),
        ErrorKind::NotFound {
            multiplicity: Multiplicity::KeyedList,
            ..
        }
    ));

    let options = Options::default().allow_values_null(true);
    assert!(container.get_with::<BTreeMap<String, Arc<Fault>>>(options).unwrap().is_empty());
    assert!(container
        .get_with::<BTreeMap<String, Vec<Arc<Fault>>>>(options)
        .unwrap()
        .is_empty());
}

#[test]
#[traced_test]
fn test_graph() {
    let container = Container::new();
    container.provide(|| Arc::new(Handler("hello"))).unwrap();
    container.get::<Arc<Handler>>().unwrap();

    let graph = container.graph();
    assert!(graph.providers.starts_with("digraph G {"));
    assert!(graph.providers.contains("Arc<Handler>"));
    assert!(graph.objects.contains("\"Arc<Handler>\" -> \"Arc<Handler>[default][0]\""));
}
