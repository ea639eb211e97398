use crate::analysis::heap::abstract_type::AbstractType;
use crate::analysis::heap::domain::{Domain, FrozenDomain, HavocScope, Slot};
use crate::analysis::heap::value::{SymbolicValue, ValueSet};
use crate::analysis::heap::well_known::MethodEffect;
use crate::context::HeapContext;
use crate::error::HeapError;
use heapscope_il::{
    BinaryOperator, EdgeGuard, FieldId, Instruction, Local, MetadataProvider, MethodId,
    MethodInfo, Parameter, ProgramPoint, PropertyRole, Temp, TypeId, UnaryOperator,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// An argument handed to a call: the storage it was passed from and its value.
#[derive(Debug, Clone, Copy)]
struct CallArg {
    address: SymbolicValue,
    value: SymbolicValue,
}

/// Interprets instructions of one method as heap state transitions.
#[derive(Debug, Clone)]
pub struct AnalysisDecoder {
    ctx: Arc<HeapContext>,
    info: MethodInfo,
    entry: Option<FrozenDomain>,
}

impl AnalysisDecoder {
    pub fn new(ctx: Arc<HeapContext>) -> Result<Self, HeapError> {
        let info = ctx.metadata().method(ctx.method)?.clone();
        Ok(Self {
            ctx,
            info,
            entry: None,
        })
    }

    pub fn ctx(&self) -> &Arc<HeapContext> {
        &self.ctx
    }

    fn metadata(&self) -> &dyn MetadataProvider {
        self.ctx.metadata()
    }

    /// The state `old(...)` scopes are evaluated in.
    pub fn set_entry(&mut self, entry: FrozenDomain) {
        self.entry = Some(entry);
    }

    /// The heap on method entry.
    ///
    /// Parameters hold unknown values of their declared type that are unmodified since
    /// entry, `this` is non-null, and locals hold the default of their type. Constructors
    /// additionally start with every instance field and auto-property of the declaring type
    /// at its default.
    pub fn entry_state(&self) -> Result<Domain, HeapError> {
        let md = self.metadata();
        let method = self.ctx.method;
        let mut d = Domain::new(self.ctx.clone());

        for p in 0..self.info.parameter_count() {
            let param = Parameter(p as u16);
            let ty = md.parameter_type(method, param)?;
            let address = d.address(Slot::Parameter(param));
            d.mark_unmodified(address);
            let v = d.value(address);
            d.refine_type(v, ty);
            if p == 0 && !self.info.is_static {
                d.mark_non_zero(v);
            }
        }

        for (i, ty) in self.info.locals.iter().enumerate() {
            let address = d.address(Slot::Local(Local(i as u16)));
            d.zero_fill(address, *ty)?;
        }

        if self.info.is_constructor && !self.info.is_static {
            let this = d.address(Slot::Parameter(Parameter(0)));
            let this = d.value(this);
            let declaring = self.info.declaring_type;
            for field in md.instance_fields(declaring)? {
                let ty = md.field(field)?.ty;
                let address = d.field_address(this, field)?;
                d.zero_fill(address, ty)?;
            }
            for getter in md.auto_property_getters(declaring)? {
                if let Some(ty) = md.method(getter)?.return_type {
                    let address = d.pseudo_field_address(getter, &[this]);
                    d.zero_fill(address, ty)?;
                }
            }
        }
        Ok(d)
    }

    /// Restrict `d` to the executions that take an edge with `guard`.
    pub fn apply_guard(&self, guard: &EdgeGuard, d: &mut Domain) {
        if let EdgeGuard::Assume { condition, truth } = guard {
            let v = read(d, *condition);
            d.assume(v, *truth);
        }
    }

    /// Apply the effect of the instruction at `pc` to `d`.
    pub fn transfer(
        &self,
        pc: ProgramPoint,
        instruction: &Instruction,
        d: &mut Domain,
    ) -> Result<(), HeapError> {
        if d.is_bottom() {
            return Ok(());
        }
        match instruction {
            Instruction::BeginOld => {
                let entry = self.entry.as_ref().ok_or(HeapError::MissingEntryState)?;
                d.begin_old(pc, entry);
                Ok(())
            }
            Instruction::EndOld { dest, source, ty } => d.end_old(*source, *dest, *ty),
            _ => d.for_each_state(|d| self.transfer_one(pc, instruction, d)),
        }
    }

    fn local_type(
        &self,
        pc: ProgramPoint,
        local: Local,
        opcode: &'static str,
    ) -> Result<TypeId, HeapError> {
        self.info
            .locals
            .get(local.0 as usize)
            .copied()
            .ok_or(HeapError::UnexpectedInstruction { pc, opcode })
    }

    fn transfer_one(
        &self,
        pc: ProgramPoint,
        instruction: &Instruction,
        d: &mut Domain,
    ) -> Result<(), HeapError> {
        use Instruction::*;
        let md = self.metadata();
        let method = self.ctx.method;
        match instruction {
            Assume { condition, truth } => {
                let v = read(d, *condition);
                d.assume(v, *truth);
            }
            Assert { condition } => {
                let v = read(d, *condition);
                d.assume(v, true);
            }
            Ldarg { param, dest } => {
                let ty = md.parameter_type(method, *param)?;
                let src = d.address(Slot::Parameter(*param));
                self.load(d, *dest, src, ty)?;
            }
            Starg { param, source } => {
                let ty = md.parameter_type(method, *param)?;
                let dest = d.address(Slot::Parameter(*param));
                store(d, dest, *source, ty)?;
            }
            Ldarga { param, dest } => {
                let ty = md.parameter_type(method, *param)?;
                let address = d.address(Slot::Parameter(*param));
                self.load_address(d, *dest, address, ty);
            }
            Ldloc { local, dest } => {
                let ty = self.local_type(pc, *local, instruction.opcode())?;
                let src = d.address(Slot::Local(*local));
                self.load(d, *dest, src, ty)?;
            }
            Stloc { local, source } => {
                let ty = self.local_type(pc, *local, instruction.opcode())?;
                let dest = d.address(Slot::Local(*local));
                store(d, dest, *source, ty)?;
            }
            Ldloca { local, dest } => {
                let ty = self.local_type(pc, *local, instruction.opcode())?;
                let address = d.address(Slot::Local(*local));
                self.load_address(d, *dest, address, ty);
            }
            Ldfld {
                field,
                object,
                dest,
            } => {
                let ty = md.field(*field)?.ty;
                let address = self.field_address(d, *object, *field)?;
                self.load(d, *dest, address, ty)?;
            }
            Ldflda {
                field,
                object,
                dest,
            } => {
                let ty = md.field(*field)?.ty;
                let address = self.field_address(d, *object, *field)?;
                self.load_address(d, *dest, address, ty);
            }
            Stfld {
                field,
                object,
                value,
            } => {
                let ty = md.field(*field)?.ty;
                let base = self.field_base(d, *object, *field)?;
                let address = d.field_address(base, *field)?;
                store(d, address, *value, ty)?;
                d.invalidate_pseudo_fields(base, *field);
            }
            Ldsfld { field, dest } => {
                let ty = md.field(*field)?.ty;
                let address = d.static_field_address(*field)?;
                self.load(d, *dest, address, ty)?;
            }
            Ldsflda { field, dest } => {
                let ty = md.field(*field)?.ty;
                let address = d.static_field_address(*field)?;
                self.load_address(d, *dest, address, ty);
            }
            Stsfld { field, value } => {
                let ty = md.field(*field)?.ty;
                let address = d.static_field_address(*field)?;
                store(d, address, *value, ty)?;
                let root = d.const_root();
                d.invalidate_pseudo_fields(root, *field);
            }
            Ldelem {
                ty,
                array,
                index,
                dest,
            } => {
                let (a, i) = (read(d, *array), read(d, *index));
                let address = d.element_address(a, i);
                self.load(d, *dest, address, *ty)?;
            }
            Ldelema {
                ty,
                array,
                index,
                dest,
            } => {
                let (a, i) = (read(d, *array), read(d, *index));
                let address = d.element_address(a, i);
                self.load_address(d, *dest, address, *ty);
            }
            Stelem {
                ty,
                array,
                index,
                value,
            } => {
                let (a, i) = (read(d, *array), read(d, *index));
                d.bump_version(a);
                let address = d.element_address(a, i);
                store(d, address, *value, *ty)?;
            }
            Ldlen { array, dest } => {
                let a = read(d, *array);
                let len = d.array_length(a);
                write(d, *dest, len);
            }
            Ldind { ty, pointer, dest } => {
                let p = read(d, *pointer);
                self.load(d, *dest, p, *ty)?;
            }
            Stind { ty, pointer, value } => {
                let p = read(d, *pointer);
                store(d, p, *value, *ty)?;
            }
            Ldnull { dest } => {
                let null = d.null();
                write(d, *dest, null);
            }
            Ldconst { value, ty, dest } => {
                let function = self.ctx.functions.for_constant(*value, *ty);
                let root = d.const_root();
                let c = d.lookup_or_create(function, &[root]);
                d.refine_type(c, *ty);
                if value.is_zero() {
                    d.mark_zero(c);
                } else {
                    d.mark_non_zero(c);
                }
                write(d, *dest, c);
            }
            Ldstr { value, dest } => {
                let function = self.ctx.functions.for_string(value);
                let root = d.const_root();
                let s = d.lookup_or_create(function, &[root]);
                d.refine_type(s, md.system_types().string);
                d.mark_non_zero(s);
                write(d, *dest, s);
            }
            Ldresult { ty, dest } => {
                let src = d.address(Slot::Result);
                self.load(d, *dest, src, *ty)?;
            }
            Binary {
                op,
                left,
                right,
                dest,
            } => {
                let (l, r) = (read(d, *left), read(d, *right));
                let v = self.binary(d, *op, l, r);
                write(d, *dest, v);
            }
            Unary { op, source, dest } => {
                let s = read(d, *source);
                let function = self.ctx.functions.for_unary(*op);
                let v = d.lookup_or_create(function, &[s]);
                if d.is_zero(s) {
                    match op {
                        // the complement of zero is all ones
                        UnaryOperator::Not => d.mark_non_zero(v),
                        UnaryOperator::Neg
                        | UnaryOperator::Conv(_)
                        | UnaryOperator::ConvChecked(_) => d.mark_zero(v),
                    }
                }
                write(d, *dest, v);
            }
            Box { ty, source, dest } => {
                if md.is_reference_type(*ty) {
                    copy_temp(d, *dest, *source)?;
                } else {
                    let boxed = d.fresh();
                    d.set_label(boxed, AbstractType::of_type(*ty));
                    d.mark_non_zero(boxed);
                    let inner = d.unbox_address(boxed);
                    let src = d.address(Slot::Temp(*source));
                    d.copy_value(inner, src, *ty)?;
                    write(d, *dest, boxed);
                }
            }
            Unbox { ty, source, dest } => {
                let boxed = read(d, *source);
                let inner = d.unbox_address(boxed);
                self.load_address(d, *dest, inner, *ty);
            }
            UnboxAny { ty, source, dest } => {
                if md.is_reference_type(*ty) {
                    self.cast(d, *ty, *source, *dest)?;
                } else {
                    let boxed = read(d, *source);
                    let inner = d.unbox_address(boxed);
                    self.load(d, *dest, inner, *ty)?;
                }
            }
            Castclass { ty, source, dest } => self.cast(d, *ty, *source, *dest)?,
            Isinst { ty, source, dest } => {
                let s = read(d, *source);
                let function = self.ctx.functions.for_isinst(*ty);
                let v = d.lookup_or_create(function, &[s]);
                d.refine_type(v, *ty);
                if d.is_zero(s) {
                    d.mark_zero(v);
                }
                write(d, *dest, v);
            }
            Call {
                method,
                is_virtual,
                args,
                dest,
            } => {
                let args = read_args(d, args);
                self.call(d, *method, *is_virtual, args, *dest, None)?;
            }
            ConstrainedCallvirt {
                constraint,
                method,
                args,
                dest,
            } => {
                let mut args = read_args(d, args);
                if md.is_struct(*constraint) {
                    let target = md.implementing_method(*constraint, *method).unwrap_or(*method);
                    self.call(d, target, false, args, *dest, None)?;
                } else {
                    if let Some(receiver) = args.first_mut() {
                        let pointer = receiver.value;
                        *receiver = CallArg {
                            address: pointer,
                            value: d.value(pointer),
                        };
                        d.refine_type(receiver.value, *constraint);
                    }
                    self.call(d, *method, true, args, *dest, None)?;
                }
            }
            Calli {
                return_type,
                function: _,
                args,
                dest,
            } => {
                debug!(%pc, "indirect call, havocking arguments");
                let args = read_args(d, args);
                let scope = HavocScope::fields(None);
                let mut modified = ValueSet::new();
                for arg in &args {
                    d.havoc_object_at_call(arg.value, &mut modified, &scope)?;
                }
                d.havoc_statics(&mut modified, &scope)?;
                d.set_modified_at_call(modified);
                if let (Some(dest), Some(ty)) = (dest, return_type) {
                    fresh_result(d, *dest, *ty);
                }
            }
            Newobj { ctor, args, dest } => self.new_object(d, *ctor, args, *dest)?,
            Newarray {
                element,
                length,
                dest,
            } => {
                let len = read(d, *length);
                let array = d.fresh();
                match md.array_type(*element) {
                    Some(ty) => d.set_label(array, AbstractType::of_type(ty)),
                    None => {
                        warn!(element = %element, "array type is not declared, leaving it unknown")
                    }
                }
                d.mark_non_zero(array);
                let array_length = d.array_length(array);
                d.assume_equal(array_length, len);
                write(d, *dest, array);
            }
            Cpobj {
                ty,
                destination,
                source,
            } => {
                let (dp, sp) = (read(d, *destination), read(d, *source));
                d.copy_value(dp, sp, *ty)?;
            }
            Initobj { ty, pointer } => {
                let p = read(d, *pointer);
                d.assign_zero(p, *ty)?;
            }
            Cpblk { destination, .. } | Initblk { destination, .. } => {
                let p = read(d, *destination);
                d.havoc(p);
            }
            Ldftn { dest, .. } | Ldvirtftn { dest, .. } => {
                let f = d.fresh();
                d.set_label(f, AbstractType::of_type(md.system_types().int_ptr));
                d.mark_non_zero(f);
                write(d, *dest, f);
            }
            Localloc { size, dest } => {
                let size = read(d, *size);
                let p = d.fresh();
                d.set_label(p, AbstractType::of_type(md.system_types().int_ptr));
                d.mark_non_zero(p);
                let writable = self.ctx.functions.writable_bytes;
                let bytes = d.lookup_or_create(writable, &[p]);
                d.assume_equal(bytes, size);
                write(d, *dest, p);
            }
            Sizeof { dest, .. } => {
                let v = d.fresh();
                d.set_label(v, AbstractType::of_type(md.system_types().int32));
                d.mark_non_zero(v);
                write(d, *dest, v);
            }
            Dup { source, dest } | Ckfinite { source, dest } => copy_temp(d, *dest, *source)?,
            Pop { source } => {
                let address = d.address(Slot::Temp(*source));
                d.havoc(address);
            }
            Return { source: Some(source) } => {
                if let Some(ty) = self.info.return_type {
                    let dest = d.address(Slot::Result);
                    store(d, dest, *source, ty)?;
                }
            }
            Return { source: None } | Throw { .. } | Rethrow | Endfinally | Nop | Break => {}
            BeginOld | EndOld { .. } => {
                return Err(HeapError::UnexpectedInstruction {
                    pc,
                    opcode: instruction.opcode(),
                });
            }
            Ldtoken { .. }
            | Arglist { .. }
            | Mkrefany { .. }
            | Refanytype { .. }
            | Refanyval { .. }
            | Jmp { .. }
            | Branch { .. }
            | BranchCond { .. }
            | Switch { .. } => {
                return Err(HeapError::UnexpectedInstruction {
                    pc,
                    opcode: instruction.opcode(),
                });
            }
        }
        Ok(())
    }

    /// The location a field access goes through: the object for references, the storage
    /// itself for struct values held in a temporary, the root for statics.
    fn field_base(
        &self,
        d: &mut Domain,
        object: Temp,
        field: FieldId,
    ) -> Result<SymbolicValue, HeapError> {
        let md = self.metadata();
        if md.field(field)?.is_static {
            return Ok(d.const_root());
        }
        let address = d.address(Slot::Temp(object));
        let v = d.value(address);
        if d.label(v).declared_type().is_some_and(|t| md.is_struct(t)) {
            Ok(address)
        } else {
            Ok(v)
        }
    }

    fn field_address(
        &self,
        d: &mut Domain,
        object: Temp,
        field: FieldId,
    ) -> Result<SymbolicValue, HeapError> {
        let base = self.field_base(d, object, field)?;
        d.field_address(base, field)
    }

    fn load(
        &self,
        d: &mut Domain,
        dest: Temp,
        src: SymbolicValue,
        ty: TypeId,
    ) -> Result<(), HeapError> {
        let address = clear_temp(d, dest);
        d.copy_value(address, src, ty)?;
        if !self.metadata().is_struct(ty) {
            let v = d.value(address);
            d.refine_type(v, ty);
        }
        Ok(())
    }

    fn load_address(&self, d: &mut Domain, dest: Temp, address: SymbolicValue, ty: TypeId) {
        if let Some(pointer) = self.metadata().managed_pointer(ty) {
            d.refine_type(address, pointer);
        }
        write(d, dest, address);
    }

    fn cast(&self, d: &mut Domain, ty: TypeId, source: Temp, dest: Temp) -> Result<(), HeapError> {
        copy_temp(d, dest, source)?;
        let v = read(d, dest);
        d.refine_type(v, ty);
        Ok(())
    }

    /// Comparisons against a known zero become the null-check idioms `x == 0` and `x != 0`.
    fn binary(
        &self,
        d: &mut Domain,
        op: BinaryOperator,
        l: SymbolicValue,
        r: SymbolicValue,
    ) -> SymbolicValue {
        let f = &self.ctx.functions;
        let boolean = self.metadata().system_types().boolean;
        let against_zero = if d.is_zero(r) {
            Some(l)
        } else if d.is_zero(l) {
            Some(r)
        } else {
            None
        };
        let v = match (op, against_zero) {
            (BinaryOperator::Ceq, Some(x)) => d.lookup_or_create(f.unary_not, &[x]),
            (BinaryOperator::Cne | BinaryOperator::CneUn, Some(x)) => {
                d.lookup_or_create(f.ne_zero, &[x])
            }
            (BinaryOperator::CgtUn, _) if d.is_zero(r) => d.lookup_or_create(f.ne_zero, &[l]),
            _ => d.lookup_or_create(f.for_binary(op), &[l, r]),
        };
        if op.is_comparison() {
            d.refine_type(v, boolean);
        }
        v
    }

    fn new_object(
        &self,
        d: &mut Domain,
        ctor: MethodId,
        args: &[Temp],
        dest: Temp,
    ) -> Result<(), HeapError> {
        let md = self.metadata();
        let declaring = md.method(ctor)?.declaring_type;
        let mut call_args = read_args(d, args);
        if md.is_struct(declaring) {
            let storage = clear_temp(d, dest);
            d.zero_fill(storage, declaring)?;
            call_args.insert(
                0,
                CallArg {
                    address: storage,
                    value: storage,
                },
            );
            self.call(d, ctor, false, call_args, None, Some(storage))
        } else {
            let object = d.fresh();
            d.set_label(object, AbstractType::of_type(declaring));
            d.mark_non_zero(object);
            for field in md.instance_fields(declaring)? {
                let ty = md.field(field)?.ty;
                let address = d.field_address(object, field)?;
                d.zero_fill(address, ty)?;
            }
            call_args.insert(
                0,
                CallArg {
                    address: object,
                    value: object,
                },
            );
            self.call(d, ctor, false, call_args, None, Some(object))?;
            write(d, dest, object);
            Ok(())
        }
    }

    /// Resolve a virtual call when the receiver's type is known exactly.
    fn devirtualize(&self, d: &Domain, method: MethodId, receiver: Option<&CallArg>) -> MethodId {
        let md = self.metadata();
        let Some(ty) = receiver.and_then(|r| d.label(r.value).declared_type()) else {
            return method;
        };
        if !(md.is_sealed(ty) || md.is_struct(ty)) {
            return method;
        }
        match md.implementing_method(ty, method) {
            Some(target) => target,
            None => {
                warn!(%method, receiver = %ty, "no implementation found on the receiver type");
                method
            }
        }
    }

    fn call(
        &self,
        d: &mut Domain,
        method: MethodId,
        is_virtual: bool,
        args: Vec<CallArg>,
        dest: Option<Temp>,
        constructed: Option<SymbolicValue>,
    ) -> Result<(), HeapError> {
        let md = self.metadata();
        if md.needs_specialization(method)? {
            return Err(HeapError::Unimplemented(
                "calls whose signature mentions unsubstituted type parameters",
            ));
        }
        let mut target = method;
        if is_virtual && self.ctx.options.devirtualize && md.method(method)?.is_virtual {
            target = self.devirtualize(d, method, args.first());
        }
        let info = md.method(target)?;

        if let Some(effect) = self.ctx.well_known.effect(target) {
            debug!(method = %target, ?effect, "well-known call");
            return self.well_known_call(d, target, effect, &args, dest);
        }

        let contracts = self.ctx.contracts();
        let pure = contracts.is_pure(target)
            || (self.ctx.options.getters_are_pure && info.is_property_getter());
        if pure {
            debug!(method = %target, "pure call");
            if let (Some(dest), Some(ty)) = (dest, info.return_type) {
                let values: Vec<SymbolicValue> = args.iter().map(|a| a.value).collect();
                let address = d.pseudo_field_address(target, &values);
                self.load(d, dest, address, ty)?;
            }
            return Ok(());
        }

        debug!(method = %target, "opaque call, havocking reachable state");
        let modifies = contracts.modifies(target);
        let mut modified = ValueSet::new();
        // a chained constructor may still assign the readonly fields of `this`
        let chained_this = if info.is_constructor
            && !info.is_static
            && self.info.is_constructor
            && !self.info.is_static
        {
            let address = d.address(Slot::Parameter(Parameter(0)));
            d.try_value(address).map(|v| d.find(v))
        } else {
            None
        };
        for (i, arg) in args.iter().enumerate() {
            let ty = md
                .parameter_type(target, Parameter(i as u16))
                .unwrap_or(md.system_types().object);
            if is_immutable_type(md, ty) {
                continue;
            }
            let is_constructed = i == 0
                && (constructed.is_some_and(|c| d.find(c) == d.find(arg.value))
                    || chained_this == Some(d.find(arg.value)));
            if md.is_struct(ty) {
                // the callee gets a copy; only what the copy references may change
                let scope = HavocScope::immutable(modifies);
                d.havoc_object_at_call(arg.address, &mut modified, &scope)?;
            } else {
                let scope = HavocScope {
                    havoc_readonly: is_constructed,
                    ..HavocScope::fields(modifies)
                };
                d.havoc_object_at_call(arg.value, &mut modified, &scope)?;
            }
        }
        if self.ctx.options.havoc_statics_at_calls {
            d.havoc_statics(&mut modified, &HavocScope::fields(modifies))?;
        }
        d.set_modified_at_call(modified);

        // auto-property setters bind the matching getter
        if let Some(PropertyRole::Setter {
            getter: Some(getter),
            backing_field: Some(_),
        }) = info.property
            && !info.is_static
            && let [receiver, value] = args.as_slice()
        {
            let address = d.pseudo_field_address(getter, &[receiver.value]);
            d.assign_value(address, value.value);
        }

        if let (Some(dest), Some(ty)) = (dest, info.return_type) {
            fresh_result(d, dest, ty);
        }
        Ok(())
    }

    fn well_known_call(
        &self,
        d: &mut Domain,
        method: MethodId,
        effect: MethodEffect,
        args: &[CallArg],
        dest: Option<Temp>,
    ) -> Result<(), HeapError> {
        let md = self.metadata();
        let return_type = md.method(method)?.return_type;
        let receiver = args.first().map(|a| a.value);
        let result = match (effect, receiver) {
            (MethodEffect::AggressiveHavoc, _) => {
                d.aggressive_havoc()?;
                None
            }
            (MethodEffect::MemberwiseClone, Some(object)) => {
                let copy = d.fresh();
                let label = d.label(object);
                d.set_label(copy, AbstractType { is_zero: false, ..label });
                d.mark_non_zero(copy);
                if let Some(ty) = label.declared_type()
                    && md.element_type(ty).is_none()
                {
                    for field in md.instance_fields(ty)? {
                        let field_ty = md.field(field)?.ty;
                        let to = d.field_address(copy, field)?;
                        let from = d.field_address(object, field)?;
                        d.copy_value(to, from, field_ty)?;
                    }
                }
                Some(copy)
            }
            (MethodEffect::ArrayLength | MethodEffect::StringLength, Some(object)) => {
                Some(d.array_length(object))
            }
            (MethodEffect::ReferenceEquality, _) => match args {
                [a, b] => Some(self.binary(d, BinaryOperator::Ceq, a.value, b.value)),
                _ => None,
            },
            (MethodEffect::Pure, _) => {
                if let (Some(dest), Some(ty)) = (dest, return_type) {
                    let values: Vec<SymbolicValue> = args.iter().map(|a| a.value).collect();
                    let address = d.pseudo_field_address(method, &values);
                    self.load(d, dest, address, ty)?;
                }
                return Ok(());
            }
            _ => None,
        };
        if let (Some(dest), Some(ty)) = (dest, return_type) {
            match result {
                Some(v) => {
                    write(d, dest, v);
                    d.refine_type(v, ty);
                }
                None => fresh_result(d, dest, ty),
            }
        }
        Ok(())
    }
}

/// Strings are the only type known to be immutable.
fn is_immutable_type(md: &dyn MetadataProvider, ty: TypeId) -> bool {
    ty == md.system_types().string
}

fn read(d: &mut Domain, temp: Temp) -> SymbolicValue {
    let address = d.address(Slot::Temp(temp));
    d.value(address)
}

fn read_args(d: &mut Domain, args: &[Temp]) -> Vec<CallArg> {
    args.iter()
        .map(|t| {
            let address = d.address(Slot::Temp(*t));
            CallArg {
                address,
                value: d.value(address),
            }
        })
        .collect()
}

/// Forget what a temporary held, including the fields of a struct stored in it.
fn clear_temp(d: &mut Domain, temp: Temp) -> SymbolicValue {
    let address = d.address(Slot::Temp(temp));
    d.havoc(address);
    address
}

fn write(d: &mut Domain, temp: Temp, value: SymbolicValue) {
    let address = clear_temp(d, temp);
    d.assign_value(address, value);
}

fn store(d: &mut Domain, dest: SymbolicValue, source: Temp, ty: TypeId) -> Result<(), HeapError> {
    let src = d.address(Slot::Temp(source));
    d.copy_value(dest, src, ty)
}

fn copy_temp(d: &mut Domain, dest: Temp, source: Temp) -> Result<(), HeapError> {
    if dest == source {
        return Ok(());
    }
    let src = d.address(Slot::Temp(source));
    let v = d.value(src);
    match d.label(v).declared_type() {
        Some(ty) if d.ctx().metadata().is_struct(ty) => {
            let address = clear_temp(d, dest);
            d.copy_struct_value(address, src, ty)
        }
        _ => {
            write(d, dest, v);
            Ok(())
        }
    }
}

fn fresh_result(d: &mut Domain, dest: Temp, ty: TypeId) {
    let address = clear_temp(d, dest);
    let v = d.value(address);
    d.refine_type(v, ty);
}
