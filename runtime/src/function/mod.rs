mod signature;

pub use signature::{Param, Signature};

use indexmap::IndexMap;

use crate::builtins::dict::PyDict;
use crate::builtins::str::PyStr;
use crate::builtins::tuple::PyTuple;
use crate::frame::Frame;
use crate::object::PyObjectRef;
use crate::{ops, PyResult};

/// Positional and keyword arguments as they arrive at a callable. Keyword
/// order is preserved, matching the call site.
#[derive(Debug, Default, Clone)]
pub struct FuncArgs {
    pub args: Vec<PyObjectRef>,
    pub kwargs: IndexMap<String, PyObjectRef>,
}

impl From<Vec<PyObjectRef>> for FuncArgs {
    fn from(args: Vec<PyObjectRef>) -> Self {
        FuncArgs {
            args,
            kwargs: IndexMap::new(),
        }
    }
}

impl FuncArgs {
    pub fn new(args: Vec<PyObjectRef>, kwargs: IndexMap<String, PyObjectRef>) -> Self {
        FuncArgs { args, kwargs }
    }

    /// Assemble arguments at a call site carrying `*seq` and/or `**mapping`.
    pub fn from_call_site(
        f: &Frame,
        mut args: Vec<PyObjectRef>,
        kwargs: Vec<(String, PyObjectRef)>,
        star: Option<&PyObjectRef>,
        double_star: Option<&PyObjectRef>,
    ) -> PyResult<Self> {
        if let Some(seq) = star {
            crate::protocol::for_each(f, seq, &mut |item| {
                args.push(item);
                Ok(())
            })?;
        }
        let mut kw: IndexMap<String, PyObjectRef> = kwargs.into_iter().collect();
        if let Some(mapping) = double_star {
            let dict = mapping.payload::<PyDict>().ok_or_else(|| {
                f.new_type_error(format!(
                    "argument after ** must be a dict, not {}",
                    mapping.class().name
                ))
            })?;
            for (key, value) in dict.entries(f)? {
                let name = key
                    .payload::<PyStr>()
                    .map(|s| s.as_str().to_owned())
                    .ok_or_else(|| f.new_type_error("keywords must be strings".to_owned()))?;
                kw.insert(name, value);
            }
        }
        Ok(FuncArgs { args, kwargs: kw })
    }

    pub fn prepend_arg(&mut self, item: PyObjectRef) {
        self.args.reserve_exact(1);
        self.args.insert(0, item);
    }

    pub fn take_positional(&mut self) -> Option<PyObjectRef> {
        if self.args.is_empty() {
            None
        } else {
            Some(self.args.remove(0))
        }
    }

    pub fn take_keyword(&mut self, name: &str) -> Option<PyObjectRef> {
        self.kwargs.swap_remove(name)
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty() && self.kwargs.is_empty()
    }

    fn reject_kwargs(&self, f: &Frame, fname: &str) -> PyResult<()> {
        if let Some(name) = self.kwargs.keys().next() {
            Err(f.new_type_error(format!(
                "{}() got an unexpected keyword argument '{}'",
                fname, name
            )))
        } else {
            Ok(())
        }
    }

    /// Bind exactly `n` positional arguments and no keywords.
    pub fn bind_exact<const N: usize>(self, f: &Frame, fname: &str) -> PyResult<[PyObjectRef; N]> {
        self.reject_kwargs(f, fname)?;
        if self.args.len() != N {
            return Err(f.new_type_error(format!(
                "{}() takes exactly {} arguments ({} given)",
                fname,
                N,
                self.args.len()
            )));
        }
        // length checked just above
        Ok(self.args.try_into().unwrap_or_else(|_| unreachable!()))
    }

    /// Bind between `MIN` and `MAX` positional arguments and no keywords;
    /// missing trailing arguments are `None`.
    pub fn bind_range<const MIN: usize, const MAX: usize>(
        self,
        f: &Frame,
        fname: &str,
    ) -> PyResult<[Option<PyObjectRef>; MAX]> {
        self.reject_kwargs(f, fname)?;
        if self.args.len() < MIN {
            return Err(f.new_type_error(format!(
                "{}() takes at least {} arguments ({} given)",
                fname,
                MIN,
                self.args.len()
            )));
        }
        if self.args.len() > MAX {
            return Err(f.new_type_error(format!(
                "{}() takes at most {} arguments ({} given)",
                fname,
                MAX,
                self.args.len()
            )));
        }
        let mut out: [Option<PyObjectRef>; MAX] = std::array::from_fn(|_| None);
        for (i, arg) in self.args.into_iter().enumerate() {
            out[i] = Some(arg);
        }
        Ok(out)
    }

    /// Pack the positional arguments into a tuple and the keywords into a
    /// dict, the shape `(*args, **kwargs)` signatures see.
    pub fn into_packed(self, f: &Frame) -> PyResult<(PyObjectRef, PyObjectRef)> {
        let ctx = f.ctx();
        let args = ctx.new_tuple(self.args).into_object();
        let kwargs = ctx.new_dict();
        for (name, value) in self.kwargs {
            let key = ctx.new_str(name).into_object();
            ops::set_item(f, kwargs.as_object(), &key, &value)?;
        }
        Ok((args, kwargs.into_object()))
    }

    pub fn as_tuple(&self, f: &Frame) -> crate::object::PyRef<PyTuple> {
        f.ctx().new_tuple(self.args.clone())
    }
}
