//! GCN opcode tables
//!
//! One enum per encoding family. Each table row carries the raw opcode
//! value, the mnemonic and the (source, destination) data types.

use super::types::{Condition, DataType};

macro_rules! opcode_table {
    (
        $(#[$meta:meta])*
        $name:ident : $family:literal {
            $($variant:ident = $value:literal, $mnemonic:literal, $src:ident, $dst:ident;)*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant,)*
        }

        impl $name {
            pub const FAMILY: &'static str = $family;

            pub fn from_raw(op: u32) -> Option<Self> {
                match op {
                    $($value => Some(Self::$variant),)*
                    _ => None,
                }
            }

            pub fn raw(self) -> u32 {
                match self {
                    $(Self::$variant => $value,)*
                }
            }

            pub fn mnemonic(self) -> &'static str {
                match self {
                    $(Self::$variant => $mnemonic,)*
                }
            }

            /// (source, destination) data types
            pub fn types(self) -> (DataType, DataType) {
                match self {
                    $(Self::$variant => (DataType::$src, DataType::$dst),)*
                }
            }
        }
    };
}

opcode_table! {
    /// Scalar binary operations
    Sop2Op: "SOP2" {
        SAddU32 = 0x00, "s_add_u32", U32, U32;
        SSubU32 = 0x01, "s_sub_u32", U32, U32;
        SAddI32 = 0x02, "s_add_i32", I32, I32;
        SSubI32 = 0x03, "s_sub_i32", I32, I32;
        SAddcU32 = 0x04, "s_addc_u32", U32, U32;
        SSubbU32 = 0x05, "s_subb_u32", U32, U32;
        SMinI32 = 0x06, "s_min_i32", I32, I32;
        SMinU32 = 0x07, "s_min_u32", U32, U32;
        SMaxI32 = 0x08, "s_max_i32", I32, I32;
        SMaxU32 = 0x09, "s_max_u32", U32, U32;
        SCselectB32 = 0x0A, "s_cselect_b32", B32, B32;
        SCselectB64 = 0x0B, "s_cselect_b64", B64, B64;
        SAndB32 = 0x0E, "s_and_b32", B32, B32;
        SAndB64 = 0x0F, "s_and_b64", B64, B64;
        SOrB32 = 0x10, "s_or_b32", B32, B32;
        SOrB64 = 0x11, "s_or_b64", B64, B64;
        SXorB32 = 0x12, "s_xor_b32", B32, B32;
        SXorB64 = 0x13, "s_xor_b64", B64, B64;
        SAndn2B32 = 0x14, "s_andn2_b32", B32, B32;
        SAndn2B64 = 0x15, "s_andn2_b64", B64, B64;
        SOrn2B32 = 0x16, "s_orn2_b32", B32, B32;
        SOrn2B64 = 0x17, "s_orn2_b64", B64, B64;
        SNandB32 = 0x18, "s_nand_b32", B32, B32;
        SNandB64 = 0x19, "s_nand_b64", B64, B64;
        SNorB32 = 0x1A, "s_nor_b32", B32, B32;
        SNorB64 = 0x1B, "s_nor_b64", B64, B64;
        SXnorB32 = 0x1C, "s_xnor_b32", B32, B32;
        SXnorB64 = 0x1D, "s_xnor_b64", B64, B64;
        SLshlB32 = 0x1E, "s_lshl_b32", B32, B32;
        SLshlB64 = 0x1F, "s_lshl_b64", B64, B64;
        SLshrB32 = 0x20, "s_lshr_b32", B32, B32;
        SLshrB64 = 0x21, "s_lshr_b64", B64, B64;
        SAshrI32 = 0x22, "s_ashr_i32", I32, I32;
        SAshrI64 = 0x23, "s_ashr_i64", I64, I64;
        SBfmB32 = 0x24, "s_bfm_b32", B32, B32;
        SBfmB64 = 0x25, "s_bfm_b64", B64, B64;
        SMulI32 = 0x26, "s_mul_i32", I32, I32;
        SBfeU32 = 0x27, "s_bfe_u32", U32, U32;
        SBfeI32 = 0x28, "s_bfe_i32", I32, I32;
        SBfeU64 = 0x29, "s_bfe_u64", U64, U64;
        SBfeI64 = 0x2A, "s_bfe_i64", I64, I64;
        SAbsdiffI32 = 0x2C, "s_absdiff_i32", I32, I32;
    }
}

opcode_table! {
    /// Scalar operations with a 16-bit inline constant
    SopkOp: "SOPK" {
        SMovkI32 = 0x00, "s_movk_i32", I32, I32;
        SCmovkI32 = 0x02, "s_cmovk_i32", I32, I32;
        SCmpkEqI32 = 0x03, "s_cmpk_eq_i32", I32, Any;
        SCmpkLgI32 = 0x04, "s_cmpk_lg_i32", I32, Any;
        SCmpkGtI32 = 0x05, "s_cmpk_gt_i32", I32, Any;
        SCmpkGeI32 = 0x06, "s_cmpk_ge_i32", I32, Any;
        SCmpkLtI32 = 0x07, "s_cmpk_lt_i32", I32, Any;
        SCmpkLeI32 = 0x08, "s_cmpk_le_i32", I32, Any;
        SCmpkEqU32 = 0x09, "s_cmpk_eq_u32", U32, Any;
        SCmpkLgU32 = 0x0A, "s_cmpk_lg_u32", U32, Any;
        SCmpkGtU32 = 0x0B, "s_cmpk_gt_u32", U32, Any;
        SCmpkGeU32 = 0x0C, "s_cmpk_ge_u32", U32, Any;
        SCmpkLtU32 = 0x0D, "s_cmpk_lt_u32", U32, Any;
        SCmpkLeU32 = 0x0E, "s_cmpk_le_u32", U32, Any;
        SAddkI32 = 0x0F, "s_addk_i32", I32, I32;
        SMulkI32 = 0x10, "s_mulk_i32", I32, I32;
        SGetregB32 = 0x12, "s_getreg_b32", B32, B32;
        SSetregB32 = 0x13, "s_setreg_b32", B32, B32;
        SSetregImm32B32 = 0x15, "s_setreg_imm32_b32", B32, B32;
    }
}

opcode_table! {
    /// Scalar unary operations
    Sop1Op: "SOP1" {
        SMovB32 = 0x03, "s_mov_b32", B32, B32;
        SMovB64 = 0x04, "s_mov_b64", B64, B64;
        SCmovB32 = 0x05, "s_cmov_b32", B32, B32;
        SCmovB64 = 0x06, "s_cmov_b64", B64, B64;
        SNotB32 = 0x07, "s_not_b32", B32, B32;
        SNotB64 = 0x08, "s_not_b64", B64, B64;
        SWqmB32 = 0x09, "s_wqm_b32", B32, B32;
        SWqmB64 = 0x0A, "s_wqm_b64", B64, B64;
        SBrevB32 = 0x0B, "s_brev_b32", B32, B32;
        SBrevB64 = 0x0C, "s_brev_b64", B64, B64;
        SBcnt1I32B32 = 0x0F, "s_bcnt1_i32_b32", B32, I32;
        SBcnt1I32B64 = 0x10, "s_bcnt1_i32_b64", B64, I32;
        SFf1I32B32 = 0x13, "s_ff1_i32_b32", B32, I32;
        SFlbitI32B32 = 0x15, "s_flbit_i32_b32", B32, I32;
        SSextI32I8 = 0x19, "s_sext_i32_i8", I32, I32;
        SSextI32I16 = 0x1A, "s_sext_i32_i16", I32, I32;
        SGetpcB64 = 0x1F, "s_getpc_b64", B64, B64;
        SSetpcB64 = 0x20, "s_setpc_b64", B64, B64;
        SSwappcB64 = 0x21, "s_swappc_b64", B64, B64;
        SAndSaveexecB64 = 0x24, "s_and_saveexec_b64", B64, B64;
        SOrSaveexecB64 = 0x25, "s_or_saveexec_b64", B64, B64;
        SXorSaveexecB64 = 0x26, "s_xor_saveexec_b64", B64, B64;
        SAndn2SaveexecB64 = 0x27, "s_andn2_saveexec_b64", B64, B64;
        SAbsI32 = 0x34, "s_abs_i32", I32, I32;
    }
}

opcode_table! {
    /// Scalar compares, result in SCC
    SopcOp: "SOPC" {
        SCmpEqI32 = 0x00, "s_cmp_eq_i32", I32, Any;
        SCmpLgI32 = 0x01, "s_cmp_lg_i32", I32, Any;
        SCmpGtI32 = 0x02, "s_cmp_gt_i32", I32, Any;
        SCmpGeI32 = 0x03, "s_cmp_ge_i32", I32, Any;
        SCmpLtI32 = 0x04, "s_cmp_lt_i32", I32, Any;
        SCmpLeI32 = 0x05, "s_cmp_le_i32", I32, Any;
        SCmpEqU32 = 0x06, "s_cmp_eq_u32", U32, Any;
        SCmpLgU32 = 0x07, "s_cmp_lg_u32", U32, Any;
        SCmpGtU32 = 0x08, "s_cmp_gt_u32", U32, Any;
        SCmpGeU32 = 0x09, "s_cmp_ge_u32", U32, Any;
        SCmpLtU32 = 0x0A, "s_cmp_lt_u32", U32, Any;
        SCmpLeU32 = 0x0B, "s_cmp_le_u32", U32, Any;
        SBitcmp0B32 = 0x0C, "s_bitcmp0_b32", B32, Any;
        SBitcmp1B32 = 0x0D, "s_bitcmp1_b32", B32, Any;
        SBitcmp0B64 = 0x0E, "s_bitcmp0_b64", B64, Any;
        SBitcmp1B64 = 0x0F, "s_bitcmp1_b64", B64, Any;
    }
}

opcode_table! {
    /// Scalar program control
    SoppOp: "SOPP" {
        SNop = 0x00, "s_nop", Any, Any;
        SEndpgm = 0x01, "s_endpgm", Any, Any;
        SBranch = 0x02, "s_branch", Any, Any;
        SCbranchScc0 = 0x04, "s_cbranch_scc0", Any, Any;
        SCbranchScc1 = 0x05, "s_cbranch_scc1", Any, Any;
        SCbranchVccz = 0x06, "s_cbranch_vccz", Any, Any;
        SCbranchVccnz = 0x07, "s_cbranch_vccnz", Any, Any;
        SCbranchExecz = 0x08, "s_cbranch_execz", Any, Any;
        SCbranchExecnz = 0x09, "s_cbranch_execnz", Any, Any;
        SBarrier = 0x0A, "s_barrier", Any, Any;
        SWaitcnt = 0x0C, "s_waitcnt", Any, Any;
        SSethalt = 0x0D, "s_sethalt", Any, Any;
        SSleep = 0x0E, "s_sleep", Any, Any;
        SSetprio = 0x0F, "s_setprio", Any, Any;
        SSendmsg = 0x10, "s_sendmsg", Any, Any;
        SSendmsghalt = 0x11, "s_sendmsghalt", Any, Any;
        STrap = 0x12, "s_trap", Any, Any;
        SIcacheInv = 0x13, "s_icache_inv", Any, Any;
        SIncperflevel = 0x14, "s_incperflevel", Any, Any;
        SDecperflevel = 0x15, "s_decperflevel", Any, Any;
        STtracedata = 0x16, "s_ttracedata", Any, Any;
    }
}

opcode_table! {
    /// Scalar memory reads
    SmrdOp: "SMRD" {
        SLoadDword = 0x00, "s_load_dword", B32, B32;
        SLoadDwordx2 = 0x01, "s_load_dwordx2", B32, B32;
        SLoadDwordx4 = 0x02, "s_load_dwordx4", B32, B32;
        SLoadDwordx8 = 0x03, "s_load_dwordx8", B32, B32;
        SLoadDwordx16 = 0x04, "s_load_dwordx16", B32, B32;
        SBufferLoadDword = 0x08, "s_buffer_load_dword", B32, B32;
        SBufferLoadDwordx2 = 0x09, "s_buffer_load_dwordx2", B32, B32;
        SBufferLoadDwordx4 = 0x0A, "s_buffer_load_dwordx4", B32, B32;
        SBufferLoadDwordx8 = 0x0B, "s_buffer_load_dwordx8", B32, B32;
        SBufferLoadDwordx16 = 0x0C, "s_buffer_load_dwordx16", B32, B32;
        SMemtime = 0x1E, "s_memtime", Any, B64;
        SDcacheInv = 0x1F, "s_dcache_inv", Any, Any;
    }
}

opcode_table! {
    /// Vector binary operations
    Vop2Op: "VOP2" {
        VCndmaskB32 = 0x00, "v_cndmask_b32", B32, B32;
        VReadlaneB32 = 0x01, "v_readlane_b32", B32, B32;
        VWritelaneB32 = 0x02, "v_writelane_b32", B32, B32;
        VAddF32 = 0x03, "v_add_f32", F32, F32;
        VSubF32 = 0x04, "v_sub_f32", F32, F32;
        VSubrevF32 = 0x05, "v_subrev_f32", F32, F32;
        VMacLegacyF32 = 0x06, "v_mac_legacy_f32", F32, F32;
        VMulLegacyF32 = 0x07, "v_mul_legacy_f32", F32, F32;
        VMulF32 = 0x08, "v_mul_f32", F32, F32;
        VMulI32I24 = 0x09, "v_mul_i32_i24", I32, I32;
        VMulHiI32I24 = 0x0A, "v_mul_hi_i32_i24", I32, I32;
        VMulU32U24 = 0x0B, "v_mul_u32_u24", U32, U32;
        VMulHiU32U24 = 0x0C, "v_mul_hi_u32_u24", U32, U32;
        VMinLegacyF32 = 0x0D, "v_min_legacy_f32", F32, F32;
        VMaxLegacyF32 = 0x0E, "v_max_legacy_f32", F32, F32;
        VMinF32 = 0x0F, "v_min_f32", F32, F32;
        VMaxF32 = 0x10, "v_max_f32", F32, F32;
        VMinI32 = 0x11, "v_min_i32", I32, I32;
        VMaxI32 = 0x12, "v_max_i32", I32, I32;
        VMinU32 = 0x13, "v_min_u32", U32, U32;
        VMaxU32 = 0x14, "v_max_u32", U32, U32;
        VLshrB32 = 0x15, "v_lshr_b32", B32, B32;
        VLshrrevB32 = 0x16, "v_lshrrev_b32", B32, B32;
        VAshrI32 = 0x17, "v_ashr_i32", I32, I32;
        VAshrrevI32 = 0x18, "v_ashrrev_i32", I32, I32;
        VLshlB32 = 0x19, "v_lshl_b32", B32, B32;
        VLshlrevB32 = 0x1A, "v_lshlrev_b32", B32, B32;
        VAndB32 = 0x1B, "v_and_b32", B32, B32;
        VOrB32 = 0x1C, "v_or_b32", B32, B32;
        VXorB32 = 0x1D, "v_xor_b32", B32, B32;
        VBfmB32 = 0x1E, "v_bfm_b32", B32, B32;
        VMacF32 = 0x1F, "v_mac_f32", F32, F32;
        VMadmkF32 = 0x20, "v_madmk_f32", F32, F32;
        VMadakF32 = 0x21, "v_madak_f32", F32, F32;
        VBcntU32B32 = 0x22, "v_bcnt_u32_b32", B32, U32;
        VMbcntLoU32B32 = 0x23, "v_mbcnt_lo_u32_b32", B32, U32;
        VMbcntHiU32B32 = 0x24, "v_mbcnt_hi_u32_b32", B32, U32;
        VAddI32 = 0x25, "v_add_i32", U32, U32;
        VSubI32 = 0x26, "v_sub_i32", U32, U32;
        VSubrevI32 = 0x27, "v_subrev_i32", U32, U32;
        VAddcU32 = 0x28, "v_addc_u32", U32, U32;
        VSubbU32 = 0x29, "v_subb_u32", U32, U32;
        VSubbrevU32 = 0x2A, "v_subbrev_u32", U32, U32;
        VLdexpF32 = 0x2B, "v_ldexp_f32", F32, F32;
        VCvtPkaccumU8F32 = 0x2C, "v_cvt_pkaccum_u8_f32", F32, B32;
        VCvtPknormI16F32 = 0x2D, "v_cvt_pknorm_i16_f32", F32, B32;
        VCvtPknormU16F32 = 0x2E, "v_cvt_pknorm_u16_f32", F32, B32;
        VCvtPkrtzF16F32 = 0x2F, "v_cvt_pkrtz_f16_f32", F32, B32;
        VCvtPkU16U32 = 0x30, "v_cvt_pk_u16_u32", U32, B32;
        VCvtPkI16I32 = 0x31, "v_cvt_pk_i16_i32", I32, B32;
    }
}

opcode_table! {
    /// Vector unary operations
    Vop1Op: "VOP1" {
        VNop = 0x00, "v_nop", Any, Any;
        VMovB32 = 0x01, "v_mov_b32", B32, B32;
        VReadfirstlaneB32 = 0x02, "v_readfirstlane_b32", B32, B32;
        VCvtI32F64 = 0x03, "v_cvt_i32_f64", F64, I32;
        VCvtF64I32 = 0x04, "v_cvt_f64_i32", I32, F64;
        VCvtF32I32 = 0x05, "v_cvt_f32_i32", I32, F32;
        VCvtF32U32 = 0x06, "v_cvt_f32_u32", U32, F32;
        VCvtU32F32 = 0x07, "v_cvt_u32_f32", F32, U32;
        VCvtI32F32 = 0x08, "v_cvt_i32_f32", F32, I32;
        VCvtF16F32 = 0x0A, "v_cvt_f16_f32", F32, B32;
        VCvtF32F16 = 0x0B, "v_cvt_f32_f16", B32, F32;
        VCvtRpiI32F32 = 0x0C, "v_cvt_rpi_i32_f32", F32, I32;
        VCvtFlrI32F32 = 0x0D, "v_cvt_flr_i32_f32", F32, I32;
        VCvtF32F64 = 0x0F, "v_cvt_f32_f64", F64, F32;
        VCvtF64F32 = 0x10, "v_cvt_f64_f32", F32, F64;
        VCvtF32Ubyte0 = 0x11, "v_cvt_f32_ubyte0", U32, F32;
        VCvtF32Ubyte1 = 0x12, "v_cvt_f32_ubyte1", U32, F32;
        VCvtF32Ubyte2 = 0x13, "v_cvt_f32_ubyte2", U32, F32;
        VCvtF32Ubyte3 = 0x14, "v_cvt_f32_ubyte3", U32, F32;
        VCvtU32F64 = 0x15, "v_cvt_u32_f64", F64, U32;
        VCvtF64U32 = 0x16, "v_cvt_f64_u32", U32, F64;
        VTruncF64 = 0x17, "v_trunc_f64", F64, F64;
        VCeilF64 = 0x18, "v_ceil_f64", F64, F64;
        VRndneF64 = 0x19, "v_rndne_f64", F64, F64;
        VFloorF64 = 0x1A, "v_floor_f64", F64, F64;
        VFractF32 = 0x20, "v_fract_f32", F32, F32;
        VTruncF32 = 0x21, "v_trunc_f32", F32, F32;
        VCeilF32 = 0x22, "v_ceil_f32", F32, F32;
        VRndneF32 = 0x23, "v_rndne_f32", F32, F32;
        VFloorF32 = 0x24, "v_floor_f32", F32, F32;
        VExpF32 = 0x25, "v_exp_f32", F32, F32;
        VLogClampF32 = 0x26, "v_log_clamp_f32", F32, F32;
        VLogF32 = 0x27, "v_log_f32", F32, F32;
        VRcpClampF32 = 0x28, "v_rcp_clamp_f32", F32, F32;
        VRcpLegacyF32 = 0x29, "v_rcp_legacy_f32", F32, F32;
        VRcpF32 = 0x2A, "v_rcp_f32", F32, F32;
        VRcpIflagF32 = 0x2B, "v_rcp_iflag_f32", F32, F32;
        VRsqClampF32 = 0x2C, "v_rsq_clamp_f32", F32, F32;
        VRsqLegacyF32 = 0x2D, "v_rsq_legacy_f32", F32, F32;
        VRsqF32 = 0x2E, "v_rsq_f32", F32, F32;
        VRcpF64 = 0x2F, "v_rcp_f64", F64, F64;
        VRsqF64 = 0x31, "v_rsq_f64", F64, F64;
        VSqrtF32 = 0x33, "v_sqrt_f32", F32, F32;
        VSqrtF64 = 0x34, "v_sqrt_f64", F64, F64;
        VSinF32 = 0x35, "v_sin_f32", F32, F32;
        VCosF32 = 0x36, "v_cos_f32", F32, F32;
        VNotB32 = 0x37, "v_not_b32", B32, B32;
        VBfrevB32 = 0x38, "v_bfrev_b32", B32, B32;
        VFfbhU32 = 0x39, "v_ffbh_u32", U32, U32;
        VFfblB32 = 0x3A, "v_ffbl_b32", B32, B32;
        VFfbhI32 = 0x3B, "v_ffbh_i32", I32, I32;
        VFrexpExpI32F32 = 0x3F, "v_frexp_exp_i32_f32", F32, I32;
        VFrexpMantF32 = 0x40, "v_frexp_mant_f32", F32, F32;
        VMovreldB32 = 0x42, "v_movreld_b32", B32, B32;
        VMovrelsB32 = 0x43, "v_movrels_b32", B32, B32;
        VLogLegacyF32 = 0x45, "v_log_legacy_f32", F32, F32;
        VExpLegacyF32 = 0x46, "v_exp_legacy_f32", F32, F32;
    }
}

opcode_table! {
    /// Vector compares, one lane bit per thread
    VopcOp: "VOPC" {
        VCmpFF32 = 0x00, "v_cmp_f_f32", F32, B64;
        VCmpLtF32 = 0x01, "v_cmp_lt_f32", F32, B64;
        VCmpEqF32 = 0x02, "v_cmp_eq_f32", F32, B64;
        VCmpLeF32 = 0x03, "v_cmp_le_f32", F32, B64;
        VCmpGtF32 = 0x04, "v_cmp_gt_f32", F32, B64;
        VCmpLgF32 = 0x05, "v_cmp_lg_f32", F32, B64;
        VCmpGeF32 = 0x06, "v_cmp_ge_f32", F32, B64;
        VCmpOF32 = 0x07, "v_cmp_o_f32", F32, B64;
        VCmpUF32 = 0x08, "v_cmp_u_f32", F32, B64;
        VCmpNgeF32 = 0x09, "v_cmp_nge_f32", F32, B64;
        VCmpNlgF32 = 0x0A, "v_cmp_nlg_f32", F32, B64;
        VCmpNgtF32 = 0x0B, "v_cmp_ngt_f32", F32, B64;
        VCmpNleF32 = 0x0C, "v_cmp_nle_f32", F32, B64;
        VCmpNeqF32 = 0x0D, "v_cmp_neq_f32", F32, B64;
        VCmpNltF32 = 0x0E, "v_cmp_nlt_f32", F32, B64;
        VCmpTruF32 = 0x0F, "v_cmp_tru_f32", F32, B64;
        VCmpxFF32 = 0x10, "v_cmpx_f_f32", F32, B64;
        VCmpxLtF32 = 0x11, "v_cmpx_lt_f32", F32, B64;
        VCmpxEqF32 = 0x12, "v_cmpx_eq_f32", F32, B64;
        VCmpxLeF32 = 0x13, "v_cmpx_le_f32", F32, B64;
        VCmpxGtF32 = 0x14, "v_cmpx_gt_f32", F32, B64;
        VCmpxLgF32 = 0x15, "v_cmpx_lg_f32", F32, B64;
        VCmpxGeF32 = 0x16, "v_cmpx_ge_f32", F32, B64;
        VCmpxOF32 = 0x17, "v_cmpx_o_f32", F32, B64;
        VCmpxUF32 = 0x18, "v_cmpx_u_f32", F32, B64;
        VCmpxNgeF32 = 0x19, "v_cmpx_nge_f32", F32, B64;
        VCmpxNlgF32 = 0x1A, "v_cmpx_nlg_f32", F32, B64;
        VCmpxNgtF32 = 0x1B, "v_cmpx_ngt_f32", F32, B64;
        VCmpxNleF32 = 0x1C, "v_cmpx_nle_f32", F32, B64;
        VCmpxNeqF32 = 0x1D, "v_cmpx_neq_f32", F32, B64;
        VCmpxNltF32 = 0x1E, "v_cmpx_nlt_f32", F32, B64;
        VCmpxTruF32 = 0x1F, "v_cmpx_tru_f32", F32, B64;
        VCmpFF64 = 0x20, "v_cmp_f_f64", F64, B64;
        VCmpLtF64 = 0x21, "v_cmp_lt_f64", F64, B64;
        VCmpEqF64 = 0x22, "v_cmp_eq_f64", F64, B64;
        VCmpLeF64 = 0x23, "v_cmp_le_f64", F64, B64;
        VCmpGtF64 = 0x24, "v_cmp_gt_f64", F64, B64;
        VCmpLgF64 = 0x25, "v_cmp_lg_f64", F64, B64;
        VCmpGeF64 = 0x26, "v_cmp_ge_f64", F64, B64;
        VCmpOF64 = 0x27, "v_cmp_o_f64", F64, B64;
        VCmpUF64 = 0x28, "v_cmp_u_f64", F64, B64;
        VCmpNgeF64 = 0x29, "v_cmp_nge_f64", F64, B64;
        VCmpNlgF64 = 0x2A, "v_cmp_nlg_f64", F64, B64;
        VCmpNgtF64 = 0x2B, "v_cmp_ngt_f64", F64, B64;
        VCmpNleF64 = 0x2C, "v_cmp_nle_f64", F64, B64;
        VCmpNeqF64 = 0x2D, "v_cmp_neq_f64", F64, B64;
        VCmpNltF64 = 0x2E, "v_cmp_nlt_f64", F64, B64;
        VCmpTruF64 = 0x2F, "v_cmp_tru_f64", F64, B64;
        VCmpFI32 = 0x80, "v_cmp_f_i32", I32, B64;
        VCmpLtI32 = 0x81, "v_cmp_lt_i32", I32, B64;
        VCmpEqI32 = 0x82, "v_cmp_eq_i32", I32, B64;
        VCmpLeI32 = 0x83, "v_cmp_le_i32", I32, B64;
        VCmpGtI32 = 0x84, "v_cmp_gt_i32", I32, B64;
        VCmpNeI32 = 0x85, "v_cmp_ne_i32", I32, B64;
        VCmpGeI32 = 0x86, "v_cmp_ge_i32", I32, B64;
        VCmpTI32 = 0x87, "v_cmp_t_i32", I32, B64;
        VCmpxFI32 = 0x90, "v_cmpx_f_i32", I32, B64;
        VCmpxLtI32 = 0x91, "v_cmpx_lt_i32", I32, B64;
        VCmpxEqI32 = 0x92, "v_cmpx_eq_i32", I32, B64;
        VCmpxLeI32 = 0x93, "v_cmpx_le_i32", I32, B64;
        VCmpxGtI32 = 0x94, "v_cmpx_gt_i32", I32, B64;
        VCmpxNeI32 = 0x95, "v_cmpx_ne_i32", I32, B64;
        VCmpxGeI32 = 0x96, "v_cmpx_ge_i32", I32, B64;
        VCmpxTI32 = 0x97, "v_cmpx_t_i32", I32, B64;
        VCmpFI64 = 0xA0, "v_cmp_f_i64", I64, B64;
        VCmpLtI64 = 0xA1, "v_cmp_lt_i64", I64, B64;
        VCmpEqI64 = 0xA2, "v_cmp_eq_i64", I64, B64;
        VCmpLeI64 = 0xA3, "v_cmp_le_i64", I64, B64;
        VCmpGtI64 = 0xA4, "v_cmp_gt_i64", I64, B64;
        VCmpNeI64 = 0xA5, "v_cmp_ne_i64", I64, B64;
        VCmpGeI64 = 0xA6, "v_cmp_ge_i64", I64, B64;
        VCmpTI64 = 0xA7, "v_cmp_t_i64", I64, B64;
        VCmpFU32 = 0xC0, "v_cmp_f_u32", U32, B64;
        VCmpLtU32 = 0xC1, "v_cmp_lt_u32", U32, B64;
        VCmpEqU32 = 0xC2, "v_cmp_eq_u32", U32, B64;
        VCmpLeU32 = 0xC3, "v_cmp_le_u32", U32, B64;
        VCmpGtU32 = 0xC4, "v_cmp_gt_u32", U32, B64;
        VCmpNeU32 = 0xC5, "v_cmp_ne_u32", U32, B64;
        VCmpGeU32 = 0xC6, "v_cmp_ge_u32", U32, B64;
        VCmpTU32 = 0xC7, "v_cmp_t_u32", U32, B64;
        VCmpxFU32 = 0xD0, "v_cmpx_f_u32", U32, B64;
        VCmpxLtU32 = 0xD1, "v_cmpx_lt_u32", U32, B64;
        VCmpxEqU32 = 0xD2, "v_cmpx_eq_u32", U32, B64;
        VCmpxLeU32 = 0xD3, "v_cmpx_le_u32", U32, B64;
        VCmpxGtU32 = 0xD4, "v_cmpx_gt_u32", U32, B64;
        VCmpxNeU32 = 0xD5, "v_cmpx_ne_u32", U32, B64;
        VCmpxGeU32 = 0xD6, "v_cmpx_ge_u32", U32, B64;
        VCmpxTU32 = 0xD7, "v_cmpx_t_u32", U32, B64;
        VCmpFU64 = 0xE0, "v_cmp_f_u64", U64, B64;
        VCmpLtU64 = 0xE1, "v_cmp_lt_u64", U64, B64;
        VCmpEqU64 = 0xE2, "v_cmp_eq_u64", U64, B64;
        VCmpLeU64 = 0xE3, "v_cmp_le_u64", U64, B64;
        VCmpGtU64 = 0xE4, "v_cmp_gt_u64", U64, B64;
        VCmpNeU64 = 0xE5, "v_cmp_ne_u64", U64, B64;
        VCmpGeU64 = 0xE6, "v_cmp_ge_u64", U64, B64;
        VCmpTU64 = 0xE7, "v_cmp_t_u64", U64, B64;
    }
}

impl VopcOp {
    pub fn condition(self) -> Condition {
        let raw = self.raw();
        if raw < 0x80 {
            Condition::from_float_index(raw)
        } else {
            Condition::from_int_index(raw)
        }
    }

    /// The cmpx forms also write the result to EXEC
    pub fn writes_exec(self) -> bool {
        self.raw() & 0x10 != 0
    }
}

impl SopcOp {
    pub fn condition(self) -> Condition {
        use SopcOp::*;
        match self {
            SCmpEqI32 | SCmpEqU32 => Condition::Eq,
            SCmpLgI32 | SCmpLgU32 => Condition::Lg,
            SCmpGtI32 | SCmpGtU32 => Condition::Gt,
            SCmpGeI32 | SCmpGeU32 => Condition::Ge,
            SCmpLtI32 | SCmpLtU32 => Condition::Lt,
            SCmpLeI32 | SCmpLeU32 => Condition::Le,
            SBitcmp0B32 | SBitcmp0B64 => Condition::Eq,
            SBitcmp1B32 | SBitcmp1B64 => Condition::Lg,
        }
    }
}

impl SopkOp {
    pub fn condition(self) -> Condition {
        use SopkOp::*;
        match self {
            SCmpkEqI32 | SCmpkEqU32 => Condition::Eq,
            SCmpkLgI32 | SCmpkLgU32 => Condition::Lg,
            SCmpkGtI32 | SCmpkGtU32 => Condition::Gt,
            SCmpkGeI32 | SCmpkGeU32 => Condition::Ge,
            SCmpkLtI32 | SCmpkLtU32 => Condition::Lt,
            SCmpkLeI32 | SCmpkLeU32 => Condition::Le,
            _ => Condition::None,
        }
    }

    pub fn is_compare(self) -> bool {
        self.condition() != Condition::None
    }
}

opcode_table! {
    /// Operations only reachable through the VOP3 encoding
    Vop3Op: "VOP3" {
        VMadLegacyF32 = 0x140, "v_mad_legacy_f32", F32, F32;
        VMadF32 = 0x141, "v_mad_f32", F32, F32;
        VMadI32I24 = 0x142, "v_mad_i32_i24", I32, I32;
        VMadU32U24 = 0x143, "v_mad_u32_u24", U32, U32;
        VCubeidF32 = 0x144, "v_cubeid_f32", F32, F32;
        VCubescF32 = 0x145, "v_cubesc_f32", F32, F32;
        VCubetcF32 = 0x146, "v_cubetc_f32", F32, F32;
        VCubemaF32 = 0x147, "v_cubema_f32", F32, F32;
        VBfeU32 = 0x148, "v_bfe_u32", U32, U32;
        VBfeI32 = 0x149, "v_bfe_i32", I32, I32;
        VBfiB32 = 0x14A, "v_bfi_b32", B32, B32;
        VFmaF32 = 0x14B, "v_fma_f32", F32, F32;
        VFmaF64 = 0x14C, "v_fma_f64", F64, F64;
        VAlignbitB32 = 0x14E, "v_alignbit_b32", B32, B32;
        VAlignbyteB32 = 0x14F, "v_alignbyte_b32", B32, B32;
        VMin3F32 = 0x151, "v_min3_f32", F32, F32;
        VMin3I32 = 0x152, "v_min3_i32", I32, I32;
        VMin3U32 = 0x153, "v_min3_u32", U32, U32;
        VMax3F32 = 0x154, "v_max3_f32", F32, F32;
        VMax3I32 = 0x155, "v_max3_i32", I32, I32;
        VMax3U32 = 0x156, "v_max3_u32", U32, U32;
        VMed3F32 = 0x157, "v_med3_f32", F32, F32;
        VMed3I32 = 0x158, "v_med3_i32", I32, I32;
        VMed3U32 = 0x159, "v_med3_u32", U32, U32;
        VSadU32 = 0x15D, "v_sad_u32", U32, U32;
        VCvtPkU8F32 = 0x15E, "v_cvt_pk_u8_f32", F32, B32;
        VDivFixupF32 = 0x15F, "v_div_fixup_f32", F32, F32;
        VLshlB64 = 0x161, "v_lshl_b64", B64, B64;
        VLshrB64 = 0x162, "v_lshr_b64", B64, B64;
        VAshrI64 = 0x163, "v_ashr_i64", I64, I64;
        VAddF64 = 0x164, "v_add_f64", F64, F64;
        VMulF64 = 0x165, "v_mul_f64", F64, F64;
        VMinF64 = 0x166, "v_min_f64", F64, F64;
        VMaxF64 = 0x167, "v_max_f64", F64, F64;
        VMulLoU32 = 0x169, "v_mul_lo_u32", U32, U32;
        VMulHiU32 = 0x16A, "v_mul_hi_u32", U32, U32;
        VMulLoI32 = 0x16B, "v_mul_lo_i32", I32, I32;
        VMulHiI32 = 0x16C, "v_mul_hi_i32", I32, I32;
        VDivScaleF32 = 0x16D, "v_div_scale_f32", F32, F32;
        VDivFmasF32 = 0x16F, "v_div_fmas_f32", F32, F32;
    }
}

impl Vop3Op {
    /// Number of source operands
    pub fn sources(self) -> usize {
        use Vop3Op::*;
        match self {
            VLshlB64 | VLshrB64 | VAshrI64 | VAddF64 | VMulF64 | VMinF64 | VMaxF64
            | VMulLoU32 | VMulHiU32 | VMulLoI32 | VMulHiI32 => 2,
            _ => 3,
        }
    }

    /// VOP3b form with a scalar carry or flag destination
    pub fn has_sdst(self) -> bool {
        matches!(self, Vop3Op::VDivScaleF32)
    }
}

impl Vop2Op {
    /// Carry-producing ops whose VOP3 form is VOP3b
    pub fn has_carry_out(self) -> bool {
        use Vop2Op::*;
        matches!(
            self,
            VAddI32 | VSubI32 | VSubrevI32 | VAddcU32 | VSubbU32 | VSubbrevU32
        )
    }

    /// Ops that read VCC (or an SGPR pair in VOP3) as a third input
    pub fn reads_vcc(self) -> bool {
        use Vop2Op::*;
        matches!(
            self,
            VCndmaskB32 | VAddcU32 | VSubbU32 | VSubbrevU32
        )
    }
}

impl Sop2Op {
    pub fn writes_scc(self) -> bool {
        use Sop2Op::*;
        !matches!(self, SCselectB32 | SCselectB64 | SMulI32 | SBfmB32 | SBfmB64)
    }
}

impl Sop1Op {
    pub fn writes_scc(self) -> bool {
        use Sop1Op::*;
        matches!(
            self,
            SNotB32
                | SNotB64
                | SWqmB32
                | SWqmB64
                | SBcnt1I32B32
                | SBcnt1I32B64
                | SAndSaveexecB64
                | SOrSaveexecB64
                | SXorSaveexecB64
                | SAndn2SaveexecB64
                | SAbsI32
        )
    }
}

opcode_table! {
    /// Attribute interpolation
    VintrpOp: "VINTRP" {
        VInterpP1F32 = 0x0, "v_interp_p1_f32", F32, F32;
        VInterpP2F32 = 0x1, "v_interp_p2_f32", F32, F32;
        VInterpMovF32 = 0x2, "v_interp_mov_f32", F32, F32;
    }
}

opcode_table! {
    /// Image loads, stores and sampling
    MimgOp: "MIMG" {
        ImageLoad = 0x00, "image_load", B32, B32;
        ImageLoadMip = 0x01, "image_load_mip", B32, B32;
        ImageStore = 0x08, "image_store", B32, B32;
        ImageStoreMip = 0x09, "image_store_mip", B32, B32;
        ImageGetResinfo = 0x0E, "image_get_resinfo", U32, U32;
        ImageSample = 0x20, "image_sample", F32, F32;
        ImageSampleCl = 0x21, "image_sample_cl", F32, F32;
        ImageSampleD = 0x22, "image_sample_d", F32, F32;
        ImageSampleDCl = 0x23, "image_sample_d_cl", F32, F32;
        ImageSampleL = 0x24, "image_sample_l", F32, F32;
        ImageSampleB = 0x25, "image_sample_b", F32, F32;
        ImageSampleBCl = 0x26, "image_sample_b_cl", F32, F32;
        ImageSampleLz = 0x27, "image_sample_lz", F32, F32;
        ImageSampleC = 0x28, "image_sample_c", F32, F32;
        ImageSampleCL = 0x2C, "image_sample_c_l", F32, F32;
        ImageSampleCB = 0x2D, "image_sample_c_b", F32, F32;
        ImageSampleCLz = 0x2F, "image_sample_c_lz", F32, F32;
        ImageGather4 = 0x40, "image_gather4", F32, F32;
        ImageGather4Lz = 0x47, "image_gather4_lz", F32, F32;
        ImageGetLod = 0x60, "image_get_lod", F32, F32;
    }
}

impl MimgOp {
    /// Whether the op consumes a sampler descriptor
    pub fn uses_sampler(self) -> bool {
        self.raw() >= 0x20
    }

    pub fn is_store(self) -> bool {
        matches!(self, MimgOp::ImageStore | MimgOp::ImageStoreMip)
    }

    /// Address VGPRs read, assuming a 2D non-array surface plus one slice
    /// component when `da` is set
    pub fn address_count(self, da: bool) -> u8 {
        use MimgOp::*;
        let coords = 2 + da as u8;
        let extra = match self {
            ImageGetResinfo => return 1,
            ImageLoadMip | ImageStoreMip => 1,
            ImageSampleCl | ImageSampleL | ImageSampleB => 1,
            ImageSampleD => 4,
            ImageSampleDCl => 5,
            ImageSampleBCl => 2,
            ImageSampleC | ImageSampleCLz => 1,
            ImageSampleCL | ImageSampleCB => 2,
            _ => 0,
        };
        coords + extra
    }
}

/// Semantic opcode, independent of the encoding that carried it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    Sop2(Sop2Op),
    Sopk(SopkOp),
    Sop1(Sop1Op),
    Sopc(SopcOp),
    Sopp(SoppOp),
    Smrd(SmrdOp),
    Vop2(Vop2Op),
    Vop1(Vop1Op),
    Vopc(VopcOp),
    Vop3(Vop3Op),
    Vintrp(VintrpOp),
    Mimg(MimgOp),
    Exp,
}

impl Opcode {
    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Sop2(op) => op.mnemonic(),
            Opcode::Sopk(op) => op.mnemonic(),
            Opcode::Sop1(op) => op.mnemonic(),
            Opcode::Sopc(op) => op.mnemonic(),
            Opcode::Sopp(op) => op.mnemonic(),
            Opcode::Smrd(op) => op.mnemonic(),
            Opcode::Vop2(op) => op.mnemonic(),
            Opcode::Vop1(op) => op.mnemonic(),
            Opcode::Vopc(op) => op.mnemonic(),
            Opcode::Vop3(op) => op.mnemonic(),
            Opcode::Vintrp(op) => op.mnemonic(),
            Opcode::Mimg(op) => op.mnemonic(),
            Opcode::Exp => "exp",
        }
    }

    pub fn types(self) -> (DataType, DataType) {
        match self {
            Opcode::Sop2(op) => op.types(),
            Opcode::Sopk(op) => op.types(),
            Opcode::Sop1(op) => op.types(),
            Opcode::Sopc(op) => op.types(),
            Opcode::Sopp(op) => op.types(),
            Opcode::Smrd(op) => op.types(),
            Opcode::Vop2(op) => op.types(),
            Opcode::Vop1(op) => op.types(),
            Opcode::Vopc(op) => op.types(),
            Opcode::Vop3(op) => op.types(),
            Opcode::Vintrp(op) => op.types(),
            Opcode::Mimg(op) => op.types(),
            Opcode::Exp => (DataType::F32, DataType::Any),
        }
    }

    pub fn condition(self) -> Condition {
        match self {
            Opcode::Vopc(op) => op.condition(),
            Opcode::Sopc(op) => op.condition(),
            Opcode::Sopk(op) => op.condition(),
            _ => Condition::None,
        }
    }

    pub fn is_program_end(self) -> bool {
        self == Opcode::Sopp(SoppOp::SEndpgm)
    }
}

/// Map a 9-bit VOP3 opcode to the semantic opcode it re-encodes
pub fn vop3_opcode(op: u32) -> Option<Opcode> {
    match op {
        0x000..=0x0FF => VopcOp::from_raw(op).map(Opcode::Vopc),
        0x100..=0x13F => Vop2Op::from_raw(op - 0x100).map(Opcode::Vop2),
        0x140..=0x17F => Vop3Op::from_raw(op).map(Opcode::Vop3),
        0x180..=0x1FF => Vop1Op::from_raw(op - 0x180).map(Opcode::Vop1),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_roundtrip() {
        let op = Sop2Op::from_raw(0x00).unwrap();
        assert_eq!(op, Sop2Op::SAddU32);
        assert_eq!(op.mnemonic(), "s_add_u32");
        assert_eq!(op.types(), (DataType::U32, DataType::U32));
        assert_eq!(Vop1Op::VRcpF32.raw(), 0x2A);
        assert!(Sop2Op::from_raw(0x0C).is_none());
    }

    #[test]
    fn test_vopc_structure() {
        let op = VopcOp::from_raw(0x11).unwrap();
        assert_eq!(op, VopcOp::VCmpxLtF32);
        assert!(op.writes_exec());
        assert_eq!(op.condition(), Condition::Lt);

        let op = VopcOp::from_raw(0xC5).unwrap();
        assert_eq!(op.condition(), Condition::Lg);
        assert!(!op.writes_exec());
        assert_eq!(op.types().0, DataType::U32);
    }

    #[test]
    fn test_vop3_opcode_ranges() {
        assert_eq!(vop3_opcode(0x141), Some(Opcode::Vop3(Vop3Op::VMadF32)));
        assert_eq!(vop3_opcode(0x103), Some(Opcode::Vop2(Vop2Op::VAddF32)));
        assert_eq!(vop3_opcode(0x1AA), Some(Opcode::Vop1(Vop1Op::VRcpF32)));
        assert_eq!(vop3_opcode(0x004), Some(Opcode::Vopc(VopcOp::VCmpGtF32)));
        assert_eq!(vop3_opcode(0x150), None);
    }

    #[test]
    fn test_mimg_classes() {
        assert!(MimgOp::ImageSample.uses_sampler());
        assert!(!MimgOp::ImageLoad.uses_sampler());
        assert_eq!(MimgOp::ImageSample.address_count(false), 2);
        assert_eq!(MimgOp::ImageSampleL.address_count(true), 4);
        assert_eq!(MimgOp::ImageGetResinfo.address_count(false), 1);
    }

    #[test]
    fn test_opcode_condition() {
        assert_eq!(
            Opcode::Sopc(SopcOp::SCmpGeU32).condition(),
            Condition::Ge
        );
        assert!(SopkOp::SCmpkLtI32.is_compare());
        assert!(!SopkOp::SMovkI32.is_compare());
        assert!(Opcode::Sopp(SoppOp::SEndpgm).is_program_end());
    }
}
