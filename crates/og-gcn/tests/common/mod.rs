//! Tiny GCN assembler for building test programs

#![allow(dead_code)]

use og_gcn::shader::*;

/// Operand codes for the 9-bit source fields
pub const fn v(reg: u16) -> u16 {
    256 + reg
}

pub const INLINE_ONE_F32: u16 = 242;
pub const LITERAL: u16 = 255;

/// Word buffer that appends the end marker on `finish`
#[derive(Default)]
pub struct Asm {
    words: Vec<u32>,
}

impl Asm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn word(mut self, word: u32) -> Self {
        self.words.push(word);
        self
    }

    pub fn sop2(self, op: Sop2Op, sdst: u8, ssrc0: u8, ssrc1: u8) -> Self {
        self.word(
            Sop2Fields {
                ssrc0,
                ssrc1,
                sdst,
                op: op.raw() as u8,
            }
            .encode(),
        )
    }

    pub fn sop1(self, op: Sop1Op, sdst: u8, ssrc0: u8) -> Self {
        self.word(
            Sop1Fields {
                ssrc0,
                op: op.raw() as u8,
                sdst,
            }
            .encode(),
        )
    }

    pub fn sopp(self, op: SoppOp, simm: u16) -> Self {
        self.word(SoppFields { simm, op: op.raw() as u8 }.encode())
    }

    pub fn endpgm(self) -> Self {
        self.sopp(SoppOp::SEndpgm, 0)
    }

    /// Scalar buffer load with an immediate dword offset
    pub fn buffer_load(self, op: SmrdOp, sdst: u8, sbase_pair: u8, dword_offset: u8) -> Self {
        self.word(
            SmrdFields {
                offset: dword_offset,
                imm: true,
                sbase: sbase_pair,
                sdst,
                op: op.raw() as u8,
            }
            .encode(),
        )
    }

    pub fn vop1(self, op: Vop1Op, vdst: u8, src0: u16) -> Self {
        self.word(
            Vop1Fields {
                src0,
                op: op.raw() as u8,
                vdst,
            }
            .encode(),
        )
    }

    pub fn vop2(self, op: Vop2Op, vdst: u8, src0: u16, vsrc1: u8) -> Self {
        self.word(
            Vop2Fields {
                src0,
                vsrc1,
                vdst,
                op: op.raw() as u8,
            }
            .encode(),
        )
    }

    pub fn interp(self, op: VintrpOp, vdst: u8, vsrc: u8, attr: u8, chan: u8) -> Self {
        self.word(
            VintrpFields {
                vsrc,
                chan,
                attr,
                op: op.raw() as u8,
                vdst,
            }
            .encode(),
        )
    }

    pub fn sample(self, op: MimgOp, vdata: u8, vaddr: u8, srsrc: u8, ssamp: u8, dmask: u8) -> Self {
        let [w0, w1] = MimgFields {
            dmask,
            unrm: false,
            glc: false,
            da: false,
            r128: false,
            tfe: false,
            lwe: false,
            op: op.raw() as u8,
            slc: false,
            vaddr,
            vdata,
            srsrc,
            ssamp,
        }
        .encode();
        self.word(w0).word(w1)
    }

    pub fn export(self, target: u8, vsrc: [u8; 4]) -> Self {
        let [w0, w1] = ExpFields {
            en: 0xF,
            target,
            compr: false,
            done: true,
            vm: true,
            vsrc,
        }
        .encode();
        self.word(w0).word(w1)
    }

    pub fn words(&self) -> &[u32] {
        &self.words
    }

    pub fn finish(self) -> Vec<u8> {
        let mut bytes: Vec<u8> = self.words.iter().flat_map(|w| w.to_le_bytes()).collect();
        bytes.extend_from_slice(END_MARKER);
        bytes.push(0);
        bytes
    }
}
