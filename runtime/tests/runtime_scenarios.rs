//! End-to-end scenarios driving the public runtime surface the way
//! compiler-emitted code does.

use pyrite_runtime::builtins::int::PyInt;
use pyrite_runtime::builtins::property::PyProperty;
use pyrite_runtime::builtins::str::PyStr;
use pyrite_runtime::class::{new_class, PyAttributes};
use pyrite_runtime::generator::PyGenerator;
use pyrite_runtime::object::{PyObjectRef, PyPayload};
use pyrite_runtime::{ops, CodeFlags, Context, ExecutionResult, Frame, FrameRef, Param, PyCode, Signature};

fn root() -> FrameRef {
    Frame::new_root(Context::global())
}

fn int_of(obj: &PyObjectRef) -> i64 {
    obj.payload::<PyInt>().unwrap().value()
}

fn str_of(obj: &PyObjectRef) -> &str {
    obj.payload::<PyStr>().unwrap().as_str()
}

#[test]
fn class_statement_over_str_basis() {
    // class Foo(object): pass
    // class Bar(Foo, str): pass
    let f = root();
    let ctx = f.ctx();
    let foo = new_class(
        &f,
        ctx.types.type_type.clone(),
        "Foo",
        vec![ctx.types.object_type.clone()],
        PyAttributes::new(),
    )
    .unwrap();
    let bar = new_class(
        &f,
        ctx.types.type_type.clone(),
        "Bar",
        vec![foo.clone(), ctx.types.str_type.clone()],
        PyAttributes::new(),
    )
    .unwrap();

    let mro: Vec<usize> = bar.iter_mro_refs().map(|t| t.get_id()).collect();
    let expected: Vec<usize> = [
        &bar,
        &foo,
        &ctx.types.str_type,
        &ctx.types.basestring_type,
        &ctx.types.object_type,
    ]
    .iter()
    .map(|t| t.get_id())
    .collect();
    assert_eq!(mro, expected);
    assert_eq!(bar.basis(), ctx.types.str_type.basis());

    // Bar('abc') builds a str-layout instance whose type is Bar
    let inst = ops::invoke(
        &f,
        &bar.clone().into_object(),
        vec![ctx.new_str("abc").into_object()].into(),
    )
    .unwrap();
    assert!(inst.class().is(&bar));
    assert_eq!(inst.payload::<PyStr>().unwrap().as_str(), "abc");
    assert!(ops::isinstance(&f, &inst, &ctx.types.str_type.clone().into_object()).unwrap());
}

#[test]
fn layout_conflict_is_rejected() {
    let f = root();
    let ctx = f.ctx();
    let err = new_class(
        &f,
        ctx.types.type_type.clone(),
        "Broken",
        vec![ctx.types.str_type.clone(), ctx.types.int_type.clone()],
        PyAttributes::new(),
    )
    .unwrap_err();
    assert_eq!(err.message(), "class layout error");
}

#[test]
fn three_argument_type_call() {
    let f = root();
    let ctx = f.ctx();
    let bases = ctx
        .new_tuple(vec![ctx.types.object_type.clone().into_object()])
        .into_object();
    let dict = ctx.new_dict().into_object();
    let name = ctx.new_str("Made").into_object();
    let cls_obj = ops::invoke(
        &f,
        &ctx.types.type_type.clone().into_object(),
        vec![name, bases, dict].into(),
    )
    .unwrap();
    let cls = pyrite_runtime::PyTypeRef::new(cls_obj.clone()).unwrap();
    assert_eq!(cls.name, "Made");

    // one-argument form inspects
    let t = ops::invoke(
        &f,
        &ctx.types.type_type.clone().into_object(),
        vec![ctx.new_int(3).into_object()].into(),
    )
    .unwrap();
    assert!(t.is(ctx.types.int_type.as_object()));
}

#[test]
fn python_defined_dunder_drives_dispatch() {
    // class Adder(object):
    //     def __add__(self, other): return 100 + other
    let f = root();
    let ctx = f.ctx();
    let code = PyCode::new(
        ctx,
        "__add__",
        "adder.py",
        Signature::new(
            "__add__",
            vec![Param::new("self"), Param::new("other")],
            false,
            false,
        ),
        CodeFlags::empty(),
        Box::new(|fr, locals| {
            let hundred = fr.ctx().new_int(100).into_object();
            let sum = ops::add(fr, &hundred, &locals[1])?;
            Ok(ExecutionResult::Return(sum))
        }),
    );
    let func =
        pyrite_runtime::builtins::function::PyFunction::new(ctx, code, f.globals().clone());
    let mut attrs = PyAttributes::new();
    attrs.insert("__add__".to_owned(), func.into_object());
    let adder = new_class(
        &f,
        ctx.types.type_type.clone(),
        "Adder",
        vec![ctx.types.object_type.clone()],
        attrs,
    )
    .unwrap();
    let inst = ops::invoke(&f, &adder.clone().into_object(), Default::default()).unwrap();
    let r = ops::add(&f, &inst, &ctx.new_int(11).into_object()).unwrap();
    assert_eq!(int_of(&r), 111);
}

#[test]
fn native_slot_is_visible_as_dunder() {
    // int.__add__ retrieved from the type surface behaves like the slot
    let f = root();
    let ctx = f.ctx();
    let int_type = ctx.types.int_type.clone().into_object();
    let add = ops::get_attr_str(&f, &int_type, "__add__").unwrap();
    let r = ops::invoke(
        &f,
        &add,
        vec![ctx.new_int(5).into_object(), ctx.new_int(3).into_object()].into(),
    )
    .unwrap();
    assert_eq!(int_of(&r), 8);

    // and it validates its receiver
    let err = ops::invoke(
        &f,
        &add,
        vec![ctx.new_str("x").into_object(), ctx.new_int(3).into_object()].into(),
    )
    .unwrap_err();
    assert_eq!(
        err.message(),
        "unbound method __add__() must be called with int instance as first argument \
         (got str instance instead)"
    );
}

#[test]
fn generator_state_machine() {
    // def f(): yield 1; yield 2; yield 3
    let f = root();
    let ctx = f.ctx();
    let gen_frame = f.new_child(None, None);
    let gen = PyGenerator::new(
        ctx,
        gen_frame,
        Box::new(|fr, _sent| {
            let state = fr.state();
            if state < 3 {
                fr.set_state(state + 1);
                Ok(ExecutionResult::Yield(
                    fr.ctx().new_int(state as i64 + 1).into_object(),
                ))
            } else {
                Ok(ExecutionResult::Return(fr.ctx().none()))
            }
        }),
    );
    let gen_obj = gen.clone().into_object();

    for expected in 1..=3 {
        let v = ops::next(&f, &gen_obj).unwrap();
        assert_eq!(int_of(&v), expected);
    }
    let err = ops::next(&f, &gen_obj).unwrap_err();
    assert!(err.isinstance(&ctx.exceptions.stop_iteration));
    // exhausted stays exhausted
    let err = ops::next(&f, &gen_obj).unwrap_err();
    assert!(err.isinstance(&ctx.exceptions.stop_iteration));
}

#[test]
fn just_started_generator_rejects_send() {
    let f = root();
    let ctx = f.ctx();
    let gen = PyGenerator::new(
        ctx,
        f.new_child(None, None),
        Box::new(|fr, _| Ok(ExecutionResult::Return(fr.ctx().none()))),
    );
    let err = gen.send(&f, ctx.new_int(42).into_object()).unwrap_err();
    assert_eq!(
        err.message(),
        "can't send non-None value to a just-started generator"
    );
}

#[test]
fn generator_sees_sent_values() {
    // def f(): total = yield 0; yield total
    let f = root();
    let ctx = f.ctx();
    let gen = PyGenerator::new(
        ctx,
        f.new_child(None, None),
        Box::new(|fr, sent| match fr.state() {
            0 => {
                fr.set_state(1);
                Ok(ExecutionResult::Yield(fr.ctx().new_int(0).into_object()))
            }
            1 => {
                fr.set_state(2);
                let sent = sent.unwrap_or_else(|| fr.ctx().none());
                Ok(ExecutionResult::Yield(sent))
            }
            _ => Ok(ExecutionResult::Return(fr.ctx().none())),
        }),
    );
    let first = gen.next(&f).unwrap();
    assert_eq!(int_of(&first), 0);
    let echoed = gen.send(&f, ctx.new_int(7).into_object()).unwrap();
    assert_eq!(int_of(&echoed), 7);
}

#[test]
fn generator_close_and_throw() {
    let f = root();
    let ctx = f.ctx();
    // a generator with a finally-style checkpoint guarding its yield
    let gen = PyGenerator::new(
        ctx,
        f.new_child(None, None),
        Box::new(|fr, _sent| match fr.state() {
            0 => {
                fr.set_state(1);
                fr.push_checkpoint(2);
                Ok(ExecutionResult::Yield(fr.ctx().new_int(1).into_object()))
            }
            1 => {
                fr.pop_checkpoint();
                Ok(ExecutionResult::Return(fr.ctx().none()))
            }
            2 => {
                // the cleanup arm re-raises whatever arrived
                let (exc, _) = fr.exc_info();
                Err(exc.unwrap_or_else(|| fr.new_runtime_error("no pending exception".to_owned())))
            }
            s => unreachable!("state {}", s),
        }),
    );
    let first = gen.next(&f).unwrap();
    assert_eq!(int_of(&first), 1);
    gen.close(&f).unwrap();
    // closed means exhausted
    let err = gen.next(&f).unwrap_err();
    assert!(err.isinstance(&ctx.exceptions.stop_iteration));

    // throwing into a fresh generator that cannot handle it propagates
    let gen = PyGenerator::new(
        ctx,
        f.new_child(None, None),
        Box::new(|fr, _| Ok(ExecutionResult::Return(fr.ctx().none()))),
    );
    let boom = f.new_value_error("boom".to_owned());
    let err = gen.throw(&f, boom).unwrap_err();
    assert_eq!(err.message(), "boom");
    let err = gen.next(&f).unwrap_err();
    assert!(err.isinstance(&ctx.exceptions.stop_iteration));
}

#[test]
fn super_on_diamond_finds_property() {
    // Top / Left(Top), Right(Top) with a property / Bottom(Left, Right)
    let f = root();
    let ctx = f.ctx();
    let object = ctx.types.object_type.clone();
    let tt = ctx.types.type_type.clone();

    let top = new_class(&f, tt.clone(), "Top", vec![object], PyAttributes::new()).unwrap();
    let left = new_class(&f, tt.clone(), "Left", vec![top.clone()], PyAttributes::new()).unwrap();

    let getter = ctx.new_builtin_func("attr", |f, args| {
        let [_inst] = args.bind_exact::<1>(f, "attr")?;
        Ok(f.ctx().new_str("right").into_object())
    });
    let prop = PyProperty::new(Some(getter), None, None, None)
        .into_ref(ctx)
        .into_object();
    let mut right_attrs = PyAttributes::new();
    right_attrs.insert("attr".to_owned(), prop);
    let right = new_class(&f, tt.clone(), "Right", vec![top.clone()], right_attrs).unwrap();

    let bottom = new_class(
        &f,
        tt.clone(),
        "Bottom",
        vec![left.clone(), right.clone()],
        PyAttributes::new(),
    )
    .unwrap();
    let instance = ops::invoke(&f, &bottom.clone().into_object(), Default::default()).unwrap();

    // super(Left, bottom_instance).attr resolves through Right
    let super_obj = ops::invoke(
        &f,
        &ctx.types.super_type.clone().into_object(),
        vec![left.clone().into_object(), instance].into(),
    )
    .unwrap();
    let value = ops::get_attr_str(&f, &super_obj, "attr").unwrap();
    assert_eq!(str_of(&value), "right");
}

#[test]
fn unbound_method_receiver_validation() {
    let f = root();
    let ctx = f.ctx();
    // list.append unbound, called with a non-list receiver
    let list_type = ctx.types.list_type.clone().into_object();
    let append = ops::get_attr_str(&f, &list_type, "append").unwrap();
    let err = ops::invoke(
        &f,
        &append,
        vec![ctx.new_int(3).into_object(), ctx.new_int(4).into_object()].into(),
    )
    .unwrap_err();
    assert_eq!(
        err.message(),
        "unbound method append() must be called with list instance as first argument \
         (got int instance instead)"
    );

    // bound usage works
    let l = ctx.new_list(vec![]).into_object();
    let append = ops::get_attr_str(&f, &l, "append").unwrap();
    ops::invoke(&f, &append, vec![ctx.new_int(4).into_object()].into()).unwrap();
    assert_eq!(ops::len(&f, &l).unwrap(), 1);
}

#[test]
fn signature_binding_scenario() {
    // f(a, b=2, *rest, **kw) called as f(1, c=3)
    let f = root();
    let ctx = f.ctx();
    let sig = Signature::new(
        "f",
        vec![
            Param::new("a"),
            Param::with_default("b", ctx.new_int(2).into_object()),
        ],
        true,
        true,
    );
    let mut args = pyrite_runtime::FuncArgs::from(vec![ctx.new_int(1).into_object()]);
    args.kwargs.insert("c".to_owned(), ctx.new_int(3).into_object());
    let resolved = sig.bind(&f, args).unwrap();
    assert_eq!(int_of(&resolved[0]), 1);
    assert_eq!(int_of(&resolved[1]), 2);
    let rest = resolved[2]
        .payload::<pyrite_runtime::builtins::tuple::PyTuple>()
        .unwrap();
    assert!(rest.as_slice().is_empty());
    let kw = resolved[3]
        .payload::<pyrite_runtime::builtins::dict::PyDict>()
        .unwrap();
    let c = kw
        .get_item_str(&f, "c")
        .unwrap()
        .expect("kwargs carry 'c'");
    assert_eq!(int_of(&c), 3);
}

#[test]
fn comparison_consistency_laws() {
    let f = root();
    let ctx = f.ctx();
    let pairs = [
        (ctx.new_int(1).into_object(), ctx.new_int(2).into_object()),
        (
            ctx.new_str("a").into_object(),
            ctx.new_str("b").into_object(),
        ),
        // cross-type: a number orders before a string
        (ctx.new_int(9).into_object(), ctx.new_str("a").into_object()),
    ];
    for (x, y) in &pairs {
        let lt = ops::is_true(&f, &ops::lt(&f, x, y).unwrap()).unwrap();
        assert!(lt);
        assert!(!ops::is_true(&f, &ops::lt(&f, y, x).unwrap()).unwrap());
        assert!(!ops::eq_bool(&f, x, y).unwrap());
        let ne = ops::is_true(&f, &ops::ne(&f, x, y).unwrap()).unwrap();
        assert!(ne);
    }
}

#[test]
fn repr_round_trip_texture() {
    let f = root();
    let ctx = f.ctx();
    let l = ctx
        .new_list(vec![
            ctx.new_int(1).into_object(),
            ctx.new_str("two").into_object(),
            ctx.none(),
            ctx.new_bool(true),
        ])
        .into_object();
    assert_eq!(ops::repr_str(&f, &l).unwrap(), "[1, 'two', None, True]");
}

#[test]
fn exception_taxonomy_catches_by_ancestor() {
    let f = root();
    let ctx = f.ctx();
    // an IndexError is a LookupError is a StandardError
    let l = ctx.new_list(vec![]).into_object();
    let err = ops::get_item(&f, &l, &ctx.new_int(0).into_object()).unwrap_err();
    assert!(err.isinstance(&ctx.exceptions.index_error));
    assert!(err.isinstance(&ctx.exceptions.lookup_error));
    assert!(err.isinstance(&ctx.exceptions.standard_error));
    assert!(!err.isinstance(&ctx.exceptions.key_error));
}

#[test]
fn isinstance_with_tuple_classinfo() {
    let f = root();
    let ctx = f.ctx();
    let value = ctx.new_int(1).into_object();
    let classinfo = ctx
        .new_tuple(vec![
            ctx.types.str_type.clone().into_object(),
            ctx.types.int_type.clone().into_object(),
        ])
        .into_object();
    assert!(ops::isinstance(&f, &value, &classinfo).unwrap());

    let err = ops::isinstance(&f, &value, &ctx.new_int(3).into_object()).unwrap_err();
    assert_eq!(err.message(), "classinfo must be a type or tuple of types");
}
