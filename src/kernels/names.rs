//! Fixed entry-point names. Each high-level operation launches exactly one
//! of these; renaming an entry point in `kernels/kernels.cu` breaks it.

// c = a op b
pub const VADD: &str = "vadd";
pub const VSUB: &str = "vsub";
pub const VMUL: &str = "vmul";
pub const VDIV: &str = "vdiv";

// a op= b
pub const VADD_ASSIGN: &str = "vaddc";
pub const VSUB_ASSIGN: &str = "vsubc";
pub const VMUL_ASSIGN: &str = "vmulc";
pub const VDIV_ASSIGN: &str = "vdivc";

// b = a op y
pub const VSADD: &str = "vsadd";
pub const VSSUB: &str = "vssub";
pub const VSMUL: &str = "vsmul";
pub const VSDIV: &str = "vsdiv";

// a op= y
pub const VSADD_ASSIGN: &str = "vsaddc";
pub const VSSUB_ASSIGN: &str = "vssubc";
pub const VSMUL_ASSIGN: &str = "vsmulc";
pub const VSDIV_ASSIGN: &str = "vsdivc";

pub const VCOPY: &str = "vcopy";

// b = f(a)
pub const VSQRT: &str = "vsqrt";
pub const VEXP: &str = "vexp";
pub const VTANH: &str = "vtanh";
pub const VTANH_D: &str = "vtanh_d";
pub const VRELU: &str = "vrelu";
pub const VRELU_D: &str = "vrelu_d";

pub const TRANSPOSE: &str = "mt";
pub const MATVEC: &str = "mvdot";
pub const MATMUL: &str = "mmdot";
pub const OUTER: &str = "vouter";

pub const SUM_PARTIAL: &str = "vsum_partial";
pub const SUM_FINAL: &str = "vsum_final";

/// Every entry point the runtime may launch.
pub const ALL: &[&str] = &[
    VADD,
    VSUB,
    VMUL,
    VDIV,
    VADD_ASSIGN,
    VSUB_ASSIGN,
    VMUL_ASSIGN,
    VDIV_ASSIGN,
    VSADD,
    VSSUB,
    VSMUL,
    VSDIV,
    VSADD_ASSIGN,
    VSSUB_ASSIGN,
    VSMUL_ASSIGN,
    VSDIV_ASSIGN,
    VCOPY,
    VSQRT,
    VEXP,
    VTANH,
    VTANH_D,
    VRELU,
    VRELU_D,
    TRANSPOSE,
    MATVEC,
    MATMUL,
    OUTER,
    SUM_PARTIAL,
    SUM_FINAL,
];
