use crate::{
    EdgeGuard, FieldId, Instruction, MetadataProvider, MethodId, Temp, TypeId, UnaryOperator,
};
use std::fmt::{Display, Formatter};

/// Trait for rendering ids using names from a [`MetadataProvider`].
///
/// Ids on their own only print as `type#N`/`field#N`/`method#N`; with metadata at hand
/// they render as the names a developer would recognize.
pub trait IlDisplay: Sized + Clone {
    fn fmt_il(&self, f: &mut Formatter<'_>, metadata: &dyn MetadataProvider) -> std::fmt::Result;

    fn display<'a>(&self, metadata: &'a dyn MetadataProvider) -> IlDisplayWrapper<'a, Self> {
        IlDisplayWrapper {
            metadata,
            inner: self.clone(),
        }
    }
}

/// Bundles a value with a metadata provider so it implements [`Display`].
#[derive(Clone)]
pub struct IlDisplayWrapper<'a, T> {
    metadata: &'a dyn MetadataProvider,
    inner: T,
}

impl<T> IlDisplayWrapper<'_, T> {
    pub fn inner(&self) -> &T {
        &self.inner
    }
}

impl<T: IlDisplay> Display for IlDisplayWrapper<'_, T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.inner.fmt_il(f, self.metadata)
    }
}

impl IlDisplay for TypeId {
    fn fmt_il(&self, f: &mut Formatter<'_>, metadata: &dyn MetadataProvider) -> std::fmt::Result {
        match metadata.type_info(*self) {
            Ok(t) => write!(f, "{}", t.name),
            Err(_) => write!(f, "{self}"),
        }
    }
}

impl IlDisplay for FieldId {
    fn fmt_il(&self, f: &mut Formatter<'_>, metadata: &dyn MetadataProvider) -> std::fmt::Result {
        match metadata.field(*self) {
            Ok(field) => write!(f, "{}", field.name),
            Err(_) => write!(f, "{self}"),
        }
    }
}

impl IlDisplay for MethodId {
    fn fmt_il(&self, f: &mut Formatter<'_>, metadata: &dyn MetadataProvider) -> std::fmt::Result {
        match metadata.method(*self) {
            Ok(m) => {
                m.declaring_type.fmt_il(f, metadata)?;
                write!(f, "::{}", m.name)
            }
            Err(_) => write!(f, "{self}"),
        }
    }
}

impl IlDisplay for EdgeGuard {
    fn fmt_il(&self, f: &mut Formatter<'_>, _: &dyn MetadataProvider) -> std::fmt::Result {
        match self {
            EdgeGuard::Always => Ok(()),
            EdgeGuard::Assume {
                condition,
                truth: true,
            } => write!(f, "[{condition}]"),
            EdgeGuard::Assume {
                condition,
                truth: false,
            } => write!(f, "[!{condition}]"),
        }
    }
}

fn write_args(f: &mut Formatter<'_>, args: &[Temp]) -> std::fmt::Result {
    write!(f, "(")?;
    for (i, a) in args.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{a}")?;
    }
    write!(f, ")")
}

impl IlDisplay for Instruction {
    fn fmt_il(&self, f: &mut Formatter<'_>, md: &dyn MetadataProvider) -> std::fmt::Result {
        use Instruction::*;
        match self {
            Assume { condition, truth } => write!(f, "assume {condition} == {truth}"),
            Ldarg { param, dest } => write!(f, "{dest} = {param}"),
            Starg { param, source } => write!(f, "{param} = {source}"),
            Ldarga { param, dest } => write!(f, "{dest} = &{param}"),
            Ldloc { local, dest } => write!(f, "{dest} = {local}"),
            Stloc { local, source } => write!(f, "{local} = {source}"),
            Ldloca { local, dest } => write!(f, "{dest} = &{local}"),
            Ldfld {
                field,
                object,
                dest,
            } => write!(f, "{dest} = {object}.{}", field.display(md)),
            Ldflda {
                field,
                object,
                dest,
            } => write!(f, "{dest} = &{object}.{}", field.display(md)),
            Stfld {
                field,
                object,
                value,
            } => write!(f, "{object}.{} = {value}", field.display(md)),
            Ldsfld { field, dest } => write!(f, "{dest} = static {}", field.display(md)),
            Stsfld { field, value } => write!(f, "static {} = {value}", field.display(md)),
            Ldelem {
                array, index, dest, ..
            } => write!(f, "{dest} = {array}[{index}]"),
            Stelem {
                array,
                index,
                value,
                ..
            } => write!(f, "{array}[{index}] = {value}"),
            Ldnull { dest } => write!(f, "{dest} = null"),
            Ldconst { value, dest, .. } => write!(f, "{dest} = {value:?}"),
            Ldstr { value, dest } => write!(f, "{dest} = {value:?}"),
            Binary {
                op,
                left,
                right,
                dest,
            } => write!(f, "{dest} = {} {left}, {right}", op.name()),
            Unary {
                op: UnaryOperator::Conv(ty) | UnaryOperator::ConvChecked(ty),
                source,
                dest,
            } => write!(f, "{dest} = ({}) {source}", ty.display(md)),
            Unary { op, source, dest } => write!(f, "{dest} = {} {source}", op.name()),
            Call {
                method, args, dest, ..
            }
            | ConstrainedCallvirt {
                method, args, dest, ..
            } => {
                if let Some(d) = dest {
                    write!(f, "{d} = ")?;
                }
                write!(f, "{} {}", self.opcode(), method.display(md))?;
                write_args(f, args)
            }
            Newobj { ctor, args, dest } => {
                write!(f, "{dest} = newobj {}", ctor.display(md))?;
                write_args(f, args)
            }
            Newarray {
                element,
                length,
                dest,
            } => write!(f, "{dest} = new {}[{length}]", element.display(md)),
            Box { ty, source, dest }
            | Unbox { ty, source, dest }
            | UnboxAny { ty, source, dest }
            | Castclass { ty, source, dest }
            | Isinst { ty, source, dest } => {
                write!(f, "{dest} = {} {} {source}", self.opcode(), ty.display(md))
            }
            Return { source: Some(s) } => write!(f, "ret {s}"),
            _ => write!(f, "{}", self.opcode()),
        }
    }
}
