use crate::frame::Frame;
use crate::function::FuncArgs;
use crate::object::PyObjectRef;
use crate::PyResult;

/// A declared parameter: a name and, past the first defaulted parameter, a
/// default value.
#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub def: Option<PyObjectRef>,
}

impl Param {
    pub fn new(name: impl Into<String>) -> Self {
        Param {
            name: name.into(),
            def: None,
        }
    }

    pub fn with_default(name: impl Into<String>, def: PyObjectRef) -> Self {
        Param {
            name: name.into(),
            def: Some(def),
        }
    }
}

/// The declared parameter list of a code block. Validation of a call against
/// the signature produces one resolved value per declared parameter, plus a
/// tuple slot when `varargs` and a dict slot when `varkwargs`.
#[derive(Debug, Clone)]
pub struct Signature {
    pub name: String,
    pub params: Vec<Param>,
    pub varargs: bool,
    pub varkwargs: bool,
    min_required: usize,
}

impl Signature {
    pub fn new(
        name: impl Into<String>,
        params: Vec<Param>,
        varargs: bool,
        varkwargs: bool,
    ) -> Self {
        let name = name.into();
        let mut min_required = 0;
        let mut seen_default = false;
        for p in &params {
            if p.def.is_some() {
                seen_default = true;
            } else {
                if seen_default {
                    panic!(
                        "{}(): parameter '{}' without a default follows one with a default",
                        name, p.name
                    );
                }
                min_required += 1;
            }
        }
        Signature {
            name,
            params,
            varargs,
            varkwargs,
            min_required,
        }
    }

    /// Number of resolved slots `bind` produces.
    pub fn nslots(&self) -> usize {
        self.params.len() + self.varargs as usize + self.varkwargs as usize
    }

    pub fn bind(&self, f: &Frame, args: FuncArgs) -> PyResult<Vec<PyObjectRef>> {
        let ctx = f.ctx();
        let nparams = self.params.len();
        let given = args.args.len();

        if given > nparams && !self.varargs {
            return Err(f.new_type_error(format!(
                "{}() takes {} arguments ({} given)",
                self.name, nparams, given
            )));
        }

        let mut slots: Vec<Option<PyObjectRef>> = vec![None; nparams];
        let mut positional = args.args.into_iter();
        for slot in slots.iter_mut().take(given.min(nparams)) {
            *slot = positional.next();
        }
        let vararg_tuple = if self.varargs {
            Some(ctx.new_tuple(positional.collect()).into_object())
        } else {
            None
        };

        let kwarg_dict = if self.varkwargs {
            Some(ctx.new_dict())
        } else {
            None
        };
        for (name, value) in args.kwargs {
            match self.params.iter().position(|p| p.name == name) {
                Some(i) => {
                    if slots[i].is_some() {
                        return Err(f.new_type_error(format!(
                            "{}() got multiple values for keyword argument '{}'",
                            self.name, name
                        )));
                    }
                    slots[i] = Some(value);
                }
                None => match &kwarg_dict {
                    Some(d) => {
                        let key = ctx.new_str(name).into_object();
                        d.set_item(f, key, value)?;
                    }
                    None => {
                        return Err(f.new_type_error(format!(
                            "{}() got an unexpected keyword argument '{}'",
                            self.name, name
                        )));
                    }
                },
            }
        }

        let mut resolved = Vec::with_capacity(self.nslots());
        for (slot, param) in slots.into_iter().zip(&self.params) {
            match slot.or_else(|| param.def.clone()) {
                Some(value) => resolved.push(value),
                None => {
                    return Err(f.new_type_error(format!(
                        "{}() takes at least {} arguments ({} given)",
                        self.name, self.min_required, given
                    )));
                }
            }
        }
        if let Some(t) = vararg_tuple {
            resolved.push(t);
        }
        if let Some(d) = kwarg_dict {
            resolved.push(d.into_object());
        }
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::frame::Frame;

    fn sig(f: &Frame) -> Signature {
        let ctx = f.ctx();
        Signature::new(
            "f",
            vec![
                Param::new("a"),
                Param::with_default("b", ctx.new_int(2).into_object()),
            ],
            true,
            true,
        )
    }

    #[test]
    fn binds_defaults_varargs_and_kwargs() {
        let f = Frame::new_root(Context::global());
        let mut args = FuncArgs::from(vec![f.ctx().new_int(1).into_object()]);
        args.kwargs
            .insert("c".to_owned(), f.ctx().new_int(3).into_object());
        let resolved = sig(&f).bind(&f, args).unwrap();
        assert_eq!(resolved.len(), 4);
        let int_of = |obj: &crate::object::PyObjectRef| {
            obj.payload::<crate::builtins::int::PyInt>().unwrap().value()
        };
        assert_eq!(int_of(&resolved[0]), 1);
        assert_eq!(int_of(&resolved[1]), 2);
        // rest == ()
        let rest = resolved[2]
            .payload::<crate::builtins::tuple::PyTuple>()
            .unwrap();
        assert!(rest.as_slice().is_empty());
        // kw == {'c': 3}
        let kw = resolved[3]
            .payload::<crate::builtins::dict::PyDict>()
            .unwrap();
        assert_eq!(kw.len(), 1);
    }

    #[test]
    fn too_many_positional() {
        let f = Frame::new_root(Context::global());
        let s = Signature::new("g", vec![Param::new("a")], false, false);
        let args = FuncArgs::from(vec![
            f.ctx().new_int(1).into_object(),
            f.ctx().new_int(2).into_object(),
        ]);
        let err = s.bind(&f, args).unwrap_err();
        assert_eq!(err.message(), "g() takes 1 arguments (2 given)");
    }

    #[test]
    fn missing_required() {
        let f = Frame::new_root(Context::global());
        let s = Signature::new("g", vec![Param::new("a"), Param::new("b")], false, false);
        let args = FuncArgs::from(vec![f.ctx().new_int(1).into_object()]);
        let err = s.bind(&f, args).unwrap_err();
        assert_eq!(err.message(), "g() takes at least 2 arguments (1 given)");
    }

    #[test]
    #[should_panic]
    fn required_after_default_is_fatal() {
        let f = Frame::new_root(Context::global());
        Signature::new(
            "g",
            vec![
                Param::with_default("a", f.ctx().none()),
                Param::new("b"),
            ],
            false,
            false,
        );
    }
}
