//! A small program shared by the heap analysis tests.

use crate::analysis::heap::analysis::{HeapAnalysisResult, analyze_method};
use crate::analysis::heap::domain::{Domain, Slot};
use crate::analysis::heap::value::SymbolicValue;
use crate::context::HeapContext;
use heapscope_il::{
    BasicBlock, BlockId, ContractTable, Edge, EdgeGuard, FieldId, FieldInfo, Instruction,
    MetadataProvider, MetadataTable, MethodBody, MethodId, MethodInfo, Parameter, PropertyRole,
    Temp, TypeId, TypeKind, Visibility,
};
use std::sync::Arc;

pub(crate) struct Fixture {
    pub metadata: MetadataTable,
    pub contracts: ContractTable,
    pub object: TypeId,
    pub int32: TypeId,
    pub boolean: TypeId,
    /// `class Node { int F; readonly int Id; Node Next; string Name { get; set; } }`,
    /// plus `static int Count`
    pub node: TypeId,
    /// `struct Pair { int A; int B; }`
    pub pair: TypeId,
    pub int_array: TypeId,
    pub f: FieldId,
    pub id: FieldId,
    pub next: FieldId,
    pub count: FieldId,
    pub pair_a: FieldId,
    pub pair_b: FieldId,
    pub get_name: MethodId,
    pub set_name: MethodId,
    pub ctor: MethodId,
    /// `void Node.Touch()`, with no contract
    pub touch: MethodId,
}

impl Fixture {
    pub fn new() -> Self {
        let mut md = MetadataTable::new();
        let system = *md.system_types();
        let node = md.add_type("Test.Node", TypeKind::Class, Some(system.object));
        let pair = md.add_type("Test.Pair", TypeKind::Struct, None);
        let int_array = md.array_of(system.int32);

        let field = |name: &str, declaring, ty, is_static, is_readonly| FieldInfo {
            name: name.to_string(),
            declaring_type: declaring,
            ty,
            is_static,
            is_readonly,
            visibility: Visibility::Public,
            generic_definition: None,
        };
        let f = md.add_field(field("F", node, system.int32, false, false)).unwrap();
        let id = md.add_field(field("Id", node, system.int32, false, true)).unwrap();
        let next = md.add_field(field("Next", node, node, false, false)).unwrap();
        let name_backing = md
            .add_field(field("<Name>k__BackingField", node, system.string, false, false))
            .unwrap();
        let count = md.add_field(field("Count", node, system.int32, true, false)).unwrap();
        let pair_a = md.add_field(field("A", pair, system.int32, false, false)).unwrap();
        let pair_b = md.add_field(field("B", pair, system.int32, false, false)).unwrap();

        let first = md.methods().count() as u32;
        let (getter_id, setter_id) = (MethodId(first), MethodId(first + 1));
        let get_name = md
            .add_method(MethodInfo {
                property: Some(PropertyRole::Getter {
                    setter: Some(setter_id),
                    backing_field: Some(name_backing),
                }),
                return_type: Some(system.string),
                ..method_info("get_Name", node)
            })
            .unwrap();
        let set_name = md
            .add_method(MethodInfo {
                property: Some(PropertyRole::Setter {
                    getter: Some(getter_id),
                    backing_field: Some(name_backing),
                }),
                parameters: vec![system.string],
                ..method_info("set_Name", node)
            })
            .unwrap();
        assert_eq!((get_name, set_name), (getter_id, setter_id));
        let ctor = md
            .add_method(MethodInfo {
                is_constructor: true,
                ..method_info(".ctor", node)
            })
            .unwrap();
        let touch = md.add_method(method_info("Touch", node)).unwrap();

        Self {
            metadata: md,
            contracts: ContractTable::new(),
            object: system.object,
            int32: system.int32,
            boolean: system.boolean,
            node,
            pair,
            int_array,
            f,
            id,
            next,
            count,
            pair_a,
            pair_b,
            get_name,
            set_name,
            ctor,
            touch,
        }
    }

    /// Declare a static method on `Node` with the given signature.
    pub fn static_method(
        &mut self,
        name: &str,
        parameters: Vec<TypeId>,
        return_type: Option<TypeId>,
        locals: Vec<TypeId>,
    ) -> MethodId {
        self.metadata
            .add_method(MethodInfo {
                parameters,
                return_type,
                locals,
                is_static: true,
                ..method_info(name, self.node)
            })
            .unwrap()
    }

    pub fn context(&self, method: MethodId) -> Arc<HeapContext> {
        Arc::new(HeapContext::new(
            Arc::new(self.metadata.clone()),
            Arc::new(self.contracts.clone()),
            method,
        ))
    }

    pub fn analyze(&self, body: &MethodBody) -> HeapAnalysisResult {
        analyze_method(self.context(body.method), body).unwrap()
    }
}

pub(crate) fn method_info(name: &str, declaring: TypeId) -> MethodInfo {
    MethodInfo {
        name: name.to_string(),
        declaring_type: declaring,
        parameters: vec![],
        return_type: None,
        locals: vec![],
        is_static: false,
        is_virtual: false,
        is_constructor: false,
        visibility: Visibility::Public,
        property: None,
        generic_arguments: vec![],
    }
}

/// A body with one block per instruction list and the given edges.
pub(crate) fn body(
    method: MethodId,
    blocks: Vec<Vec<Instruction>>,
    edges: Vec<(u32, u32, EdgeGuard)>,
) -> MethodBody {
    MethodBody {
        method,
        entry: BlockId(0),
        blocks: blocks
            .into_iter()
            .map(|instructions| BasicBlock { instructions })
            .collect(),
        edges: edges
            .into_iter()
            .map(|(from, to, guard)| Edge {
                from: BlockId(from),
                to: BlockId(to),
                guard,
            })
            .collect(),
    }
}

pub(crate) fn branch_on(condition: u16, truth: bool) -> EdgeGuard {
    EdgeGuard::Assume {
        condition: Temp(condition),
        truth,
    }
}

/// The value currently held by a slot, without materializing one.
pub(crate) fn slot_value(d: &Domain, slot: Slot) -> Option<SymbolicValue> {
    let f = &d.ctx().functions;
    let function = match slot {
        Slot::Local(l) => f.for_local(l),
        Slot::Parameter(p) => f.for_parameter(p),
        Slot::Temp(t) => f.for_temp(t),
        Slot::Result => f.return_value,
    };
    let address = d.lookup(function, &[d.const_root()])?;
    d.try_value(address)
}

pub(crate) fn param(d: &Domain, index: u16) -> Option<SymbolicValue> {
    slot_value(d, Slot::Parameter(Parameter(index)))
}
