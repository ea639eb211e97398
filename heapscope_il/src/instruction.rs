use crate::ids::{FieldId, Local, MethodId, Parameter, Temp, TypeId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum BinaryOperator {
    Add,
    AddOvf,
    AddOvfUn,
    And,
    Ceq,
    Cge,
    CgeUn,
    Cgt,
    CgtUn,
    Cle,
    CleUn,
    Clt,
    CltUn,
    Cne,
    CneUn,
    Div,
    DivUn,
    LogicalAnd,
    LogicalOr,
    Mul,
    MulOvf,
    MulOvfUn,
    Or,
    Rem,
    RemUn,
    Shl,
    Shr,
    ShrUn,
    Sub,
    SubOvf,
    SubOvfUn,
    Xor,
}

impl BinaryOperator {
    pub fn is_comparison(&self) -> bool {
        use BinaryOperator::*;
        matches!(
            self,
            Ceq | Cge | CgeUn | Cgt | CgtUn | Cle | CleUn | Clt | CltUn | Cne | CneUn
        )
    }

    pub fn name(&self) -> &'static str {
        use BinaryOperator::*;
        match self {
            Add => "add",
            AddOvf => "add.ovf",
            AddOvfUn => "add.ovf.un",
            And => "and",
            Ceq => "ceq",
            Cge => "cge",
            CgeUn => "cge.un",
            Cgt => "cgt",
            CgtUn => "cgt.un",
            Cle => "cle",
            CleUn => "cle.un",
            Clt => "clt",
            CltUn => "clt.un",
            Cne => "cne",
            CneUn => "cne.un",
            Div => "div",
            DivUn => "div.un",
            LogicalAnd => "land",
            LogicalOr => "lor",
            Mul => "mul",
            MulOvf => "mul.ovf",
            MulOvfUn => "mul.ovf.un",
            Or => "or",
            Rem => "rem",
            RemUn => "rem.un",
            Shl => "shl",
            Shr => "shr",
            ShrUn => "shr.un",
            Sub => "sub",
            SubOvf => "sub.ovf",
            SubOvfUn => "sub.ovf.un",
            Xor => "xor",
        }
    }
}

#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum UnaryOperator {
    Neg,
    Not,
    /// Numeric conversion to the given primitive type
    Conv(TypeId),
    /// Checked numeric conversion to the given primitive type
    ConvChecked(TypeId),
}

impl UnaryOperator {
    pub fn name(&self) -> &'static str {
        match self {
            UnaryOperator::Neg => "neg",
            UnaryOperator::Not => "not",
            UnaryOperator::Conv(_) => "conv",
            UnaryOperator::ConvChecked(_) => "conv.ovf",
        }
    }
}

/// A literal. Floats are kept as their bit pattern so constants can be hashed.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum ConstValue {
    Int(i64),
    Float(u64),
}

impl ConstValue {
    pub fn is_zero(&self) -> bool {
        match self {
            ConstValue::Int(i) => *i == 0,
            ConstValue::Float(bits) => f64::from_bits(*bits) == 0.0,
        }
    }
}

/// A decoded instruction in stack-slot form.
///
/// Every operand and result is named by a [`Temp`]: `dest` slots are written, every other
/// `Temp` is read. Control flow never appears inside a block except through the
/// unsupported raw branch forms, which the heap analysis rejects; branches are carried by
/// [`Edge`](crate::Edge)s instead.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Instruction {
    Assume {
        condition: Temp,
        truth: bool,
    },
    Assert {
        condition: Temp,
    },
    /// Opens an `old(...)` scope: following instructions are evaluated in the entry state too
    BeginOld,
    /// Closes the innermost `old(...)` scope, moving `source` of the old state into `dest`
    EndOld {
        dest: Temp,
        source: Temp,
        ty: TypeId,
    },
    Ldarg {
        param: Parameter,
        dest: Temp,
    },
    Starg {
        param: Parameter,
        source: Temp,
    },
    Ldarga {
        param: Parameter,
        dest: Temp,
    },
    Ldloc {
        local: Local,
        dest: Temp,
    },
    Stloc {
        local: Local,
        source: Temp,
    },
    Ldloca {
        local: Local,
        dest: Temp,
    },
    Ldfld {
        field: FieldId,
        object: Temp,
        dest: Temp,
    },
    Ldflda {
        field: FieldId,
        object: Temp,
        dest: Temp,
    },
    Stfld {
        field: FieldId,
        object: Temp,
        value: Temp,
    },
    Ldsfld {
        field: FieldId,
        dest: Temp,
    },
    Ldsflda {
        field: FieldId,
        dest: Temp,
    },
    Stsfld {
        field: FieldId,
        value: Temp,
    },
    Ldelem {
        ty: TypeId,
        array: Temp,
        index: Temp,
        dest: Temp,
    },
    Ldelema {
        ty: TypeId,
        array: Temp,
        index: Temp,
        dest: Temp,
    },
    Stelem {
        ty: TypeId,
        array: Temp,
        index: Temp,
        value: Temp,
    },
    Ldlen {
        array: Temp,
        dest: Temp,
    },
    Ldind {
        ty: TypeId,
        pointer: Temp,
        dest: Temp,
    },
    Stind {
        ty: TypeId,
        pointer: Temp,
        value: Temp,
    },
    Ldnull {
        dest: Temp,
    },
    Ldconst {
        value: ConstValue,
        ty: TypeId,
        dest: Temp,
    },
    Ldstr {
        value: String,
        dest: Temp,
    },
    /// Reads the method's return value inside a postcondition
    Ldresult {
        ty: TypeId,
        dest: Temp,
    },
    Binary {
        op: BinaryOperator,
        left: Temp,
        right: Temp,
        dest: Temp,
    },
    Unary {
        op: UnaryOperator,
        source: Temp,
        dest: Temp,
    },
    Box {
        ty: TypeId,
        source: Temp,
        dest: Temp,
    },
    /// Yields a managed pointer into the boxed value
    Unbox {
        ty: TypeId,
        source: Temp,
        dest: Temp,
    },
    UnboxAny {
        ty: TypeId,
        source: Temp,
        dest: Temp,
    },
    Castclass {
        ty: TypeId,
        source: Temp,
        dest: Temp,
    },
    Isinst {
        ty: TypeId,
        source: Temp,
        dest: Temp,
    },
    Call {
        method: MethodId,
        is_virtual: bool,
        args: Vec<Temp>,
        dest: Option<Temp>,
    },
    /// `constrained. T callvirt M`; the receiver argument is a managed pointer to a `T`
    ConstrainedCallvirt {
        constraint: TypeId,
        method: MethodId,
        args: Vec<Temp>,
        dest: Option<Temp>,
    },
    Calli {
        return_type: Option<TypeId>,
        function: Temp,
        args: Vec<Temp>,
        dest: Option<Temp>,
    },
    Newobj {
        ctor: MethodId,
        args: Vec<Temp>,
        dest: Temp,
    },
    Newarray {
        element: TypeId,
        length: Temp,
        dest: Temp,
    },
    Cpobj {
        ty: TypeId,
        destination: Temp,
        source: Temp,
    },
    Initobj {
        ty: TypeId,
        pointer: Temp,
    },
    Cpblk {
        destination: Temp,
        source: Temp,
        size: Temp,
    },
    Initblk {
        destination: Temp,
        value: Temp,
        size: Temp,
    },
    Ldftn {
        method: MethodId,
        dest: Temp,
    },
    Ldvirtftn {
        method: MethodId,
        object: Temp,
        dest: Temp,
    },
    Localloc {
        size: Temp,
        dest: Temp,
    },
    Sizeof {
        ty: TypeId,
        dest: Temp,
    },
    Dup {
        source: Temp,
        dest: Temp,
    },
    Pop {
        source: Temp,
    },
    Ckfinite {
        source: Temp,
        dest: Temp,
    },
    Nop,
    Break,
    Return {
        source: Option<Temp>,
    },
    Throw {
        exception: Temp,
    },
    Rethrow,
    Endfinally,
    Ldtoken {
        dest: Temp,
    },
    Arglist {
        dest: Temp,
    },
    Mkrefany {
        ty: TypeId,
        source: Temp,
        dest: Temp,
    },
    Refanytype {
        source: Temp,
        dest: Temp,
    },
    Refanyval {
        ty: TypeId,
        source: Temp,
        dest: Temp,
    },
    Jmp {
        method: MethodId,
    },
    Branch {
        target: u32,
    },
    BranchCond {
        condition: Temp,
        target: u32,
    },
    Switch {
        selector: Temp,
        targets: Vec<u32>,
    },
}

impl Instruction {
    /// The mnemonic of the instruction, used in diagnostics.
    pub fn opcode(&self) -> &'static str {
        use Instruction::*;
        match self {
            Assume { .. } => "assume",
            Assert { .. } => "assert",
            BeginOld => "begin_old",
            EndOld { .. } => "end_old",
            Ldarg { .. } => "ldarg",
            Starg { .. } => "starg",
            Ldarga { .. } => "ldarga",
            Ldloc { .. } => "ldloc",
            Stloc { .. } => "stloc",
            Ldloca { .. } => "ldloca",
            Ldfld { .. } => "ldfld",
            Ldflda { .. } => "ldflda",
            Stfld { .. } => "stfld",
            Ldsfld { .. } => "ldsfld",
            Ldsflda { .. } => "ldsflda",
            Stsfld { .. } => "stsfld",
            Ldelem { .. } => "ldelem",
            Ldelema { .. } => "ldelema",
            Stelem { .. } => "stelem",
            Ldlen { .. } => "ldlen",
            Ldind { .. } => "ldind",
            Stind { .. } => "stind",
            Ldnull { .. } => "ldnull",
            Ldconst { .. } => "ldc",
            Ldstr { .. } => "ldstr",
            Ldresult { .. } => "ldresult",
            Binary { op, .. } => op.name(),
            Unary { op, .. } => op.name(),
            Box { .. } => "box",
            Unbox { .. } => "unbox",
            UnboxAny { .. } => "unbox.any",
            Castclass { .. } => "castclass",
            Isinst { .. } => "isinst",
            Call {
                is_virtual: true, ..
            } => "callvirt",
            Call { .. } => "call",
            ConstrainedCallvirt { .. } => "constrained.callvirt",
            Calli { .. } => "calli",
            Newobj { .. } => "newobj",
            Newarray { .. } => "newarr",
            Cpobj { .. } => "cpobj",
            Initobj { .. } => "initobj",
            Cpblk { .. } => "cpblk",
            Initblk { .. } => "initblk",
            Ldftn { .. } => "ldftn",
            Ldvirtftn { .. } => "ldvirtftn",
            Localloc { .. } => "localloc",
            Sizeof { .. } => "sizeof",
            Dup { .. } => "dup",
            Pop { .. } => "pop",
            Ckfinite { .. } => "ckfinite",
            Nop => "nop",
            Break => "break",
            Return { .. } => "ret",
            Throw { .. } => "throw",
            Rethrow => "rethrow",
            Endfinally => "endfinally",
            Ldtoken { .. } => "ldtoken",
            Arglist { .. } => "arglist",
            Mkrefany { .. } => "mkrefany",
            Refanytype { .. } => "refanytype",
            Refanyval { .. } => "refanyval",
            Jmp { .. } => "jmp",
            Branch { .. } => "br",
            BranchCond { .. } => "brtrue",
            Switch { .. } => "switch",
        }
    }

    /// Whether the instruction ends the method or transfers control out of the block.
    pub fn terminates_block(&self) -> bool {
        matches!(
            self,
            Instruction::Return { .. }
                | Instruction::Throw { .. }
                | Instruction::Rethrow
                | Instruction::Endfinally
                | Instruction::Jmp { .. }
                | Instruction::Branch { .. }
                | Instruction::BranchCond { .. }
                | Instruction::Switch { .. }
        )
    }
}
