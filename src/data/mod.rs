mod light_curve;
pub use light_curve::LightCurveSegment;
