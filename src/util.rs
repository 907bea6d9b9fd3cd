#[inline(always)]
pub(crate) fn zero_inverse(value: f32) -> f32 {
    if value != 0.0 { 1.0 / value } else { 0.0 }
}

#[inline(always)]
pub(crate) fn dot(a: [f32; 3], b: [f32; 3]) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

#[inline(always)]
pub(crate) fn sub(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

/// Normalizes `v` in place and returns its original length; zero vectors stay zero.
pub(crate) fn normalize(v: &mut [f32; 3]) -> f32 {
    let length = dot(*v, *v).sqrt();
    let inv = zero_inverse(length);

    v[0] *= inv;
    v[1] *= inv;
    v[2] *= inv;

    length
}
