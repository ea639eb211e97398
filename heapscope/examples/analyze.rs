use heapscope::display::Detail;
use heapscope::il::{
    BasicBlock, BinaryOperator, BlockId, ConstValue, Edge, EdgeGuard, FieldInfo, Instruction,
    MetadataProvider, MetadataTable, MethodBody, MethodInfo, Parameter, Program, Temp, TypeKind,
    Visibility,
};
use heapscope::{HeapAnalysisOptions, analyze_program};
use tracing_subscriber::EnvFilter;

/// ```text
/// class Cell { int Value; }
/// static void Bump(Cell c) { if (c != null) c.Value = c.Value + 1; }
/// ```
fn bump_program() -> Program {
    let mut md = MetadataTable::new();
    let system = *md.system_types();
    let cell = md.add_type("Demo.Cell", TypeKind::Class, Some(system.object));
    let value = md
        .add_field(FieldInfo {
            name: "Value".to_string(),
            declaring_type: cell,
            ty: system.int32,
            is_static: false,
            is_readonly: false,
            visibility: Visibility::Public,
            generic_definition: None,
        })
        .unwrap();
    let bump = md
        .add_method(MethodInfo {
            name: "Bump".to_string(),
            declaring_type: cell,
            parameters: vec![cell],
            return_type: None,
            locals: vec![],
            is_static: true,
            is_virtual: false,
            is_constructor: false,
            visibility: Visibility::Public,
            property: None,
            generic_arguments: vec![],
        })
        .unwrap();

    let c = Temp(0);
    let null = Temp(1);
    let is_null = Temp(2);
    let (old, one, new) = (Temp(3), Temp(4), Temp(5));
    let body = MethodBody {
        method: bump,
        entry: BlockId(0),
        blocks: vec![
            BasicBlock {
                instructions: vec![
                    Instruction::Ldarg {
                        param: Parameter(0),
                        dest: c,
                    },
                    Instruction::Ldnull { dest: null },
                    Instruction::Binary {
                        op: BinaryOperator::Ceq,
                        left: c,
                        right: null,
                        dest: is_null,
                    },
                ],
            },
            BasicBlock {
                instructions: vec![
                    Instruction::Ldfld {
                        field: value,
                        object: c,
                        dest: old,
                    },
                    Instruction::Ldconst {
                        value: ConstValue::Int(1),
                        ty: system.int32,
                        dest: one,
                    },
                    Instruction::Binary {
                        op: BinaryOperator::Add,
                        left: old,
                        right: one,
                        dest: new,
                    },
                    Instruction::Stfld {
                        field: value,
                        object: c,
                        value: new,
                    },
                ],
            },
            BasicBlock {
                instructions: vec![Instruction::Return { source: None }],
            },
        ],
        edges: vec![
            Edge {
                from: BlockId(0),
                to: BlockId(1),
                guard: EdgeGuard::Assume {
                    condition: is_null,
                    truth: false,
                },
            },
            Edge {
                from: BlockId(0),
                to: BlockId(2),
                guard: EdgeGuard::Assume {
                    condition: is_null,
                    truth: true,
                },
            },
            Edge {
                from: BlockId(1),
                to: BlockId(2),
                guard: EdgeGuard::Always,
            },
        ],
    };
    Program {
        metadata: md,
        contracts: Default::default(),
        bodies: vec![body],
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let program = bump_program();
    for (method, result) in analyze_program(&program, &HeapAnalysisOptions::default()) {
        let body = program.body(method).unwrap();
        match result {
            Ok(result) => println!("{}", result.listing(body, Detail::Instructions)),
            Err(e) => println!("{method}: unanalyzable ({e})"),
        }
    }
}
