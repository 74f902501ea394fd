use crate::{foundation::math::Fnv1a64, resolve::resolver::DrawCommand};

/// 128-bit identity of a resolved command list; equal lists paint equal frames.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize)]
pub struct FrameFingerprint {
    pub hi: u64,
    pub lo: u64,
}

pub fn fingerprint_commands(commands: &[DrawCommand]) -> FrameFingerprint {
    let mut a = Fnv1a64::new_default();
    let mut b = Fnv1a64::new(0x9ae1_6a3b_2f90_404f);

    write_u64_pair(&mut a, &mut b, commands.len() as u64);
    for cmd in commands {
        write_str_pair(&mut a, &mut b, &cmd.source_name);
        let r = cmd.source_rect;
        for v in [r.x, r.y, r.w, r.h] {
            a.write_i64(v);
            b.write_i64(v);
        }
        a.write_u8(u8::from(r.rotated));
        b.write_u8(u8::from(r.rotated));
        for c in cmd.transform.as_coeffs() {
            // -0.0 and 0.0 paint the same.
            let c = if c == 0.0 { 0.0 } else { c };
            a.write_f64(c);
            b.write_f64(c);
        }
    }

    FrameFingerprint {
        hi: a.finish(),
        lo: b.finish(),
    }
}

fn write_u64_pair(a: &mut Fnv1a64, b: &mut Fnv1a64, v: u64) {
    a.write_u64(v);
    b.write_u64(v);
}

fn write_str_pair(a: &mut Fnv1a64, b: &mut Fnv1a64, s: &str) {
    a.write_str(s);
    b.write_str(s);
}
