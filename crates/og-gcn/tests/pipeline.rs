//! End-to-end tests for decode, analysis and translation

mod common;

use common::*;
use og_core::config::ShaderConfig;
use og_core::error::GcnError;
use og_gcn::shader::spirv::{self, instructions, validate_structure};
use og_gcn::shader::*;
use std::sync::Arc;

fn compile(bytes: &[u8], stage: ShaderStage) -> CompiledShader {
    ShaderCompiler::default().compile(bytes, stage).unwrap()
}

fn count_ops(words: &[u32], opcode: u16) -> usize {
    instructions(words)
        .filter_map(|i| i.ok())
        .filter(|i| i.opcode == opcode)
        .count()
}

fn decorated(words: &[u32], decoration: u32) -> Vec<Vec<u32>> {
    instructions(words)
        .filter_map(|i| i.ok())
        .filter(|i| i.opcode == spirv::OP_DECORATE && i.operands[1] == decoration)
        .map(|i| i.operands[2..].to_vec())
        .collect()
}

fn first_instruction(words: &[u32]) -> Instruction {
    let bytes = words
        .iter()
        .fold(Asm::new(), |asm, &w| asm.word(w))
        .finish();
    Decoder::new(&bytes, 1 << 20)
        .unwrap()
        .next()
        .unwrap()
        .unwrap()
}

const STAGES: [ShaderStage; 3] = [ShaderStage::Vertex, ShaderStage::Pixel, ShaderStage::Compute];

/// Words the decoded fields encode back to, without any literal
fn reencode(fields: &Fields) -> Vec<u32> {
    match *fields {
        Fields::Sop2(f) => vec![f.encode()],
        Fields::Sopk(f) => vec![f.encode()],
        Fields::Sop1(f) => vec![f.encode()],
        Fields::Sopc(f) => vec![f.encode()],
        Fields::Sopp(f) => vec![f.encode()],
        Fields::Smrd(f) => vec![f.encode()],
        Fields::Vop2(f) => vec![f.encode()],
        Fields::Vop1(f) => vec![f.encode()],
        Fields::Vopc(f) => vec![f.encode()],
        Fields::Vop3(f) => f.encode().to_vec(),
        Fields::Vintrp(f) => vec![f.encode()],
        Fields::Mimg(f) => f.encode().to_vec(),
        Fields::Exp(f) => f.encode().to_vec(),
    }
}

/// Decode one instruction, check its fields re-encode to the same words and
/// that a program made of it compiles to a well-formed module in every stage
fn check_instruction(words: &[u32]) -> Instruction {
    let insn = first_instruction(words);
    let name = insn.mnemonic();
    assert_eq!(insn.length, words.len(), "{}", name);
    if !matches!(insn.fields, Fields::Vop3(_)) {
        let encoded = reencode(&insn.fields);
        assert_eq!(encoded[..], words[..encoded.len()], "{}", name);
    }

    let bytes = words
        .iter()
        .fold(Asm::new(), |asm, &w| asm.word(w))
        .endpgm()
        .finish();
    for stage in STAGES {
        let compiled = ShaderCompiler::default()
            .compile(&bytes, stage)
            .unwrap_or_else(|e| panic!("{} in {}: {}", name, stage.name(), e));
        validate_structure(&compiled.module.words).unwrap();
    }
    insn
}

#[test]
fn test_sop2_fields_survive_decode() {
    for raw in 0..0x80 {
        let Some(op) = Sop2Op::from_raw(raw) else {
            continue;
        };
        let word = Sop2Fields {
            ssrc0: 3,
            ssrc1: 7,
            sdst: 9,
            op: raw as u8,
        }
        .encode();
        let insn = check_instruction(&[word]);

        assert_eq!(insn.opcode, Opcode::Sop2(op));
        assert_eq!(insn.fields, Fields::Sop2(Sop2Fields::decode(word)));
        assert_eq!((insn.dst.kind, insn.dst.id), (OperandKind::Sgpr, 9), "{}", op.mnemonic());
        assert_eq!(insn.src[0].id, 3, "{}", op.mnemonic());
        assert_eq!(insn.src[1].id, 7, "{}", op.mnemonic());
    }
}

#[test]
fn test_vector_fields_survive_decode() {
    for raw in 0..0x40 {
        let Some(op) = Vop2Op::from_raw(raw) else {
            continue;
        };
        let mut words = vec![Vop2Fields {
            src0: v(4),
            vsrc1: 5,
            vdst: 6,
            op: raw as u8,
        }
        .encode()];
        if matches!(op, Vop2Op::VMadmkF32 | Vop2Op::VMadakF32) {
            words.push(0x4000_0000);
        }
        let insn = check_instruction(&words);

        assert_eq!(insn.opcode, Opcode::Vop2(op));
        match insn.fields {
            Fields::Vop2(f) => assert_eq!(f.encode(), words[0]),
            other => panic!("{}: unexpected fields {:?}", op.mnemonic(), other),
        }
        assert_eq!(insn.dst.id, 6, "{}", op.mnemonic());
        assert_eq!((insn.src[0].kind, insn.src[0].id), (OperandKind::Vgpr, 4));
    }

    for raw in 0..0x100 {
        let Some(op) = Vop1Op::from_raw(raw) else {
            continue;
        };
        let word = Vop1Fields {
            src0: v(4),
            op: raw as u8,
            vdst: 6,
        }
        .encode();
        let insn = check_instruction(&[word]);

        assert_eq!(insn.opcode, Opcode::Vop1(op));
        assert_eq!(insn.fields, Fields::Vop1(Vop1Fields::decode(word)));
        if op != Vop1Op::VNop {
            assert_eq!(insn.dst.id, 6, "{}", op.mnemonic());
            assert_eq!((insn.src[0].kind, insn.src[0].id), (OperandKind::Vgpr, 4));
        }
    }
}

#[test]
fn test_scalar_families_survive_decode() {
    for raw in 0..0x20 {
        let Some(op) = SopkOp::from_raw(raw) else {
            continue;
        };
        let mut words = vec![SopkFields {
            simm: 0x1234,
            sdst: 10,
            op: raw as u8,
        }
        .encode()];
        if op == SopkOp::SSetregImm32B32 {
            words.push(0xFF);
        }
        let insn = check_instruction(&words);
        assert_eq!(insn.opcode, Opcode::Sopk(op));
    }

    for raw in 0..0x100 {
        let Some(op) = Sop1Op::from_raw(raw) else {
            continue;
        };
        let word = Sop1Fields {
            ssrc0: 4,
            op: raw as u8,
            sdst: 10,
        }
        .encode();
        let insn = check_instruction(&[word]);
        assert_eq!(insn.opcode, Opcode::Sop1(op));
        if op != Sop1Op::SSetpcB64 {
            assert_eq!(insn.dst.id, 10, "{}", op.mnemonic());
        }
    }

    for raw in 0..0x80 {
        let Some(op) = SopcOp::from_raw(raw) else {
            continue;
        };
        let word = SopcFields {
            ssrc0: 4,
            ssrc1: 5,
            op: raw as u8,
        }
        .encode();
        let insn = check_instruction(&[word]);
        assert_eq!(insn.opcode, Opcode::Sopc(op));
        assert_eq!((insn.src[0].id, insn.src[1].id), (4, 5), "{}", op.mnemonic());
    }

    for raw in 0..0x80 {
        let Some(op) = SoppOp::from_raw(raw) else {
            continue;
        };
        let word = SoppFields { simm: 3, op: raw as u8 }.encode();
        let insn = check_instruction(&[word]);
        assert_eq!(insn.opcode, Opcode::Sopp(op));
    }

    for raw in 0..0x20 {
        let Some(op) = SmrdOp::from_raw(raw) else {
            continue;
        };
        let word = SmrdFields {
            offset: 1,
            imm: true,
            sbase: 2,
            sdst: 8,
            op: raw as u8,
        }
        .encode();
        let insn = check_instruction(&[word]);
        assert_eq!(insn.opcode, Opcode::Smrd(op));
    }
}

#[test]
fn test_vector_compare_fields_survive_decode() {
    for raw in 0..0x100 {
        let Some(op) = VopcOp::from_raw(raw) else {
            continue;
        };
        let word = VopcFields {
            src0: v(4),
            vsrc1: 5,
            op: raw as u8,
        }
        .encode();
        let insn = check_instruction(&[word]);
        assert_eq!(insn.opcode, Opcode::Vopc(op));
        assert_eq!((insn.src[0].kind, insn.src[0].id), (OperandKind::Vgpr, 4));
        assert_eq!((insn.src[1].kind, insn.src[1].id), (OperandKind::Vgpr, 5));
    }
}

#[test]
fn test_vop3_fields_survive_decode() {
    for raw in 0..0x200u16 {
        let Some(opcode) = vop3_opcode(raw as u32) else {
            continue;
        };
        // the K constant forms have no VOP3 encoding
        if matches!(
            opcode,
            Opcode::Vop2(Vop2Op::VMadmkF32) | Opcode::Vop2(Vop2Op::VMadakF32)
        ) {
            continue;
        }
        let carry = match opcode {
            Opcode::Vop2(op) => op.has_carry_out(),
            Opcode::Vop3(op) => op.has_sdst(),
            _ => false,
        };
        let fields = Vop3Fields {
            vdst: 8,
            abs: 0,
            clamp: false,
            sdst: if carry { 10 } else { 0 },
            op: raw,
            src0: v(4),
            src1: v(5),
            src2: v(6),
            omod: 0,
            neg: 0,
        };
        let words = if carry { fields.encode_b() } else { fields.encode() };
        let insn = check_instruction(&words);

        assert_eq!(insn.opcode, opcode);
        let Fields::Vop3(decoded) = insn.fields else {
            panic!("{}: unexpected fields {:?}", opcode.mnemonic(), insn.fields);
        };
        let encoded = if carry { decoded.encode_b() } else { decoded.encode() };
        assert_eq!(encoded, words, "{}", opcode.mnemonic());
        if carry {
            assert_eq!(decoded.sdst, 10, "{}", opcode.mnemonic());
        }
    }
}

#[test]
fn test_memory_and_interface_fields_survive_decode() {
    for raw in 0..4 {
        let Some(op) = VintrpOp::from_raw(raw) else {
            continue;
        };
        let words = Asm::new().interp(op, 2, 1, 3, 1);
        let insn = check_instruction(words.words());
        assert_eq!(insn.opcode, Opcode::Vintrp(op));
        assert_eq!(insn.src[1].kind, OperandKind::Attr);
        assert_eq!(insn.src[1].id, 3);
    }

    for raw in 0..0x80 {
        let Some(op) = MimgOp::from_raw(raw) else {
            continue;
        };
        let words = Asm::new().sample(op, 8, 0, 4, 7, 0xF);
        let insn = check_instruction(words.words());
        assert_eq!(insn.opcode, Opcode::Mimg(op));
        assert_eq!(insn.src[1].id, 16, "{}", op.mnemonic());
        if op.uses_sampler() {
            assert_eq!(insn.src[2].id, 28, "{}", op.mnemonic());
        }
    }

    let targets = (0..=9).chain(12..=15).chain(32..64);
    for target in targets {
        let words = Asm::new().export(target, [0, 1, 2, 3]);
        let insn = check_instruction(words.words());
        assert_eq!(insn.opcode, Opcode::Exp);
    }

    // reserved targets are skipped
    let bytes = Asm::new().export(10, [0, 1, 2, 3]).endpgm().finish();
    let first = Decoder::new(&bytes, 1 << 20).unwrap().next().unwrap();
    assert!(matches!(
        first,
        Err(SkippedInstruction {
            error: GcnError::UnknownOperand { code: 10, .. },
            ..
        })
    ));
}

#[test]
fn test_scan_bounds() {
    for n in [0usize, 1, 5] {
        let bytes = (0..n)
            .fold(Asm::new(), |asm, _| asm.endpgm())
            .finish();
        assert_eq!(scan(&bytes, 1 << 20).unwrap(), 4 * n);
    }

    let no_marker = vec![0xAAu8; 40];
    assert!(matches!(
        scan(&no_marker, 1 << 20),
        Err(GcnError::UnboundedScan { scanned: 40 })
    ));

    // marker beyond the configured bound
    let far = Asm::new().endpgm().endpgm().endpgm().endpgm().finish();
    assert!(matches!(
        scan(&far, 8),
        Err(GcnError::UnboundedScan { scanned: 8 })
    ));
}

#[test]
fn test_register_bitmaps_are_exact() {
    let bytes = Asm::new()
        .vop2(Vop2Op::VAddF32, 10, 5, 10)
        .endpgm()
        .finish();
    let report = analyze(&bytes, &ShaderConfig::default()).unwrap();

    assert_eq!(report.sgprs.iter().collect::<Vec<_>>(), vec![5]);
    assert_eq!(report.vgprs.iter().collect::<Vec<_>>(), vec![10]);
    assert!(report.tmps.is_empty());
    assert!(report.types.contains(TypeMask::F32));
}

#[test]
fn test_analysis_is_deterministic() {
    let bytes = Asm::new()
        .buffer_load(SmrdOp::SBufferLoadDwordx4, 12, 2, 0)
        .sample(MimgOp::ImageSample, 4, 0, 4, 6, 0xF)
        .vop2(Vop2Op::VMulF32, 8, v(4), 5)
        // two-word DS encoding, skipped
        .word(0xD800_0000)
        .word(0)
        .endpgm()
        .finish();
    let config = ShaderConfig::default();
    let a = analyze(&bytes, &config).unwrap();
    let b = analyze(&bytes, &config).unwrap();

    assert_eq!(a, b);
    assert!(!Arc::ptr_eq(&a.buffers[0], &b.buffers[0]));
    assert_eq!(a.skipped.len(), 1);

    // any observable difference breaks equality
    b.textures[0].write().payload = ResourcePayload::Texture(TextureView::default());
    assert_ne!(a, b);
}

#[test]
fn test_single_buffer_load_binds_zero() {
    let bytes = Asm::new()
        .buffer_load(SmrdOp::SBufferLoadDword, 8, 2, 1)
        .endpgm()
        .finish();

    for stage in [ShaderStage::Vertex, ShaderStage::Pixel, ShaderStage::Compute] {
        let compiled = compile(&bytes, stage);
        assert_eq!(compiled.report.buffers.len(), 1);
        assert_eq!(compiled.module.bindings.len(), 1);

        let binding = &compiled.module.bindings[0];
        assert_eq!(binding.kind, ResourceKind::Buffer);
        assert_eq!(binding.binding, 0);
        assert_eq!(binding.set, stage.descriptor_set());
        assert!(Arc::ptr_eq(&binding.resource, &compiled.report.buffers[0]));
        assert_eq!(
            decorated(&compiled.module.words, spirv::DECORATION_DESCRIPTOR_SET),
            vec![vec![stage.descriptor_set()]]
        );
    }
}

#[test]
fn test_buffer_order_follows_program_order() {
    // A reads the descriptor in s[4:7], B the one in s[8:11]
    let bytes = Asm::new()
        .buffer_load(SmrdOp::SBufferLoadDword, 20, 2, 0)
        .buffer_load(SmrdOp::SBufferLoadDword, 21, 4, 0)
        .endpgm()
        .finish();

    for _ in 0..4 {
        let compiled = compile(&bytes, ShaderStage::Pixel);
        let sources: Vec<_> = compiled
            .report
            .buffers
            .iter()
            .map(|h| h.read().dependency.kind.clone())
            .collect();
        assert_eq!(
            sources,
            vec![
                DependencyKind::ScalarRegister(4),
                DependencyKind::ScalarRegister(8),
            ]
        );
        let slots: Vec<_> = compiled.module.bindings.iter().map(|b| b.binding).collect();
        assert_eq!(slots, vec![0, 1]);
    }
}

#[test]
fn test_unsupported_program_still_translates() {
    let bytes = Asm::new().sopp(SoppOp::SBarrier, 0).finish();
    let compiled = compile(&bytes, ShaderStage::Compute);

    validate_structure(&compiled.module.words).unwrap();
    assert_eq!(compiled.skipped.len(), 1);
    let (pass, skip) = &compiled.skipped[0];
    assert_eq!(*pass, Pass::Translate);
    assert!(matches!(
        skip.error,
        GcnError::Unsupported {
            mnemonic: "s_barrier",
            ..
        }
    ));
    assert_eq!(count_ops(&compiled.module.words, spirv::OP_STORE), 0);
}

#[test]
fn test_scalar_add_end_to_end() {
    let bytes = Asm::new().word(0x8000_1234).finish();
    let compiled = compile(&bytes, ShaderStage::Compute);
    let report = &compiled.report;

    assert_eq!(report.sgprs.iter().collect::<Vec<_>>(), vec![0, 18, 52]);
    assert!(report.tmps.contains(TMP_SCC));
    assert!(report.types.contains(TypeMask::U32));

    let words = &compiled.module.words;
    assert_eq!(count_ops(words, spirv::OP_IADD), 1);
    let uint = instructions(words)
        .filter_map(|i| i.ok())
        .filter(|i| i.opcode == spirv::OP_TYPE_INT)
        .map(|i| i.operands[1..].to_vec())
        .collect::<Vec<_>>();
    assert_eq!(uint, vec![vec![32, 0]]);
    assert!(compiled.is_complete());
}

#[test]
fn test_out_of_range_operand_is_fatal() {
    // sixteen dwords starting at s120 run past the scalar file
    let bytes = Asm::new()
        .buffer_load(SmrdOp::SBufferLoadDwordx16, 120, 2, 0)
        .finish();
    let result = ShaderCompiler::default().compile(&bytes, ShaderStage::Pixel);
    assert!(matches!(
        result,
        Err(GcnError::OperandOutOfRange { start: 120, count: 16, .. })
    ));
}

struct Guest {
    sgprs: [u32; 16],
}

impl GuestState for Guest {
    fn sgpr(&self, index: u32) -> u32 {
        self.sgprs.get(index as usize).copied().unwrap_or(0)
    }

    fn resolve_indirect_read(&self, _address: u64, _size: usize) -> Option<Vec<u8>> {
        None
    }
}

#[test]
fn test_descriptors_refresh_after_translation() {
    let bytes = Asm::new()
        .buffer_load(SmrdOp::SBufferLoadDword, 8, 2, 0)
        .endpgm()
        .finish();
    let compiled = compile(&bytes, ShaderStage::Pixel);

    let mut sgprs = [0u32; 16];
    sgprs[4..8].copy_from_slice(&[0x0010_0000, 0x0010_0000, 256, 0]);
    compiled.report.refresh_resources(&Guest { sgprs }).unwrap();

    // the binding shares the descriptor refreshed through the report
    let desc = compiled.module.bindings[0].resource.read();
    assert!(desc.is_loaded());
    match desc.payload {
        ResourcePayload::Buffer(view) => {
            assert_eq!(view.base_address, 0x0010_0000);
            assert_eq!(view.stride, 16);
            assert_eq!(view.num_records, 256);
        }
        other => panic!("unexpected payload {:?}", other),
    }
}

#[test]
fn test_pixel_program() {
    let bytes = Asm::new()
        .interp(VintrpOp::VInterpP1F32, 2, 0, 0, 0)
        .interp(VintrpOp::VInterpP2F32, 2, 1, 0, 0)
        .interp(VintrpOp::VInterpP1F32, 3, 0, 0, 1)
        .interp(VintrpOp::VInterpP2F32, 3, 1, 0, 1)
        .sample(MimgOp::ImageSample, 4, 2, 2, 4, 0xF)
        .export(0, [4, 5, 6, 7])
        .endpgm()
        .finish();
    let compiled = compile(&bytes, ShaderStage::Pixel);
    assert!(compiled.is_complete(), "{:?}", compiled.skipped);

    let report = &compiled.report;
    assert_eq!(report.attrs, 1);
    assert_eq!(report.exports.mrt, 1);

    let words = &compiled.module.words;
    assert_eq!(count_ops(words, spirv::OP_IMAGE_SAMPLE_IMPLICIT_LOD), 1);
    // attr0 input and mrt0 output
    assert_eq!(
        decorated(words, spirv::DECORATION_LOCATION),
        vec![vec![0], vec![0]]
    );
    let kinds: Vec<_> = compiled
        .module
        .bindings
        .iter()
        .map(|b| (b.kind, b.binding))
        .collect();
    assert_eq!(
        kinds,
        vec![(ResourceKind::Texture, 0), (ResourceKind::Sampler, 1)]
    );
}

#[test]
fn test_vertex_program() {
    let bytes = Asm::new()
        .vop1(Vop1Op::VCvtF32U32, 1, v(0))
        .export(12, [4, 5, 6, 7])
        .export(32, [1, 1, 1, 1])
        .endpgm()
        .finish();
    let compiled = compile(&bytes, ShaderStage::Vertex);
    assert!(compiled.is_complete(), "{:?}", compiled.skipped);
    assert_eq!(compiled.report.exports.pos, 1);
    assert_eq!(compiled.report.exports.param, 1);

    let words = &compiled.module.words;
    assert_eq!(
        decorated(words, spirv::DECORATION_BUILTIN),
        vec![vec![spirv::BUILTIN_POSITION], vec![spirv::BUILTIN_VERTEX_INDEX]]
    );
    assert_eq!(count_ops(words, spirv::OP_CONVERT_U_TO_F), 1);
}

#[test]
fn test_exports_for_another_stage_are_skipped() {
    let bytes = Asm::new().export(0, [0, 1, 2, 3]).endpgm().finish();
    let compiled = compile(&bytes, ShaderStage::Compute);

    validate_structure(&compiled.module.words).unwrap();
    assert_eq!(compiled.skipped.len(), 1);
    assert!(matches!(
        compiled.skipped[0].1.error,
        GcnError::Unsupported { mnemonic: "exp", .. }
    ));
}
