pub mod generative;
pub mod vision;

pub use generative::{
    GenerativeClassifierPort, GenerativeSeverity, GenerativeTrigger, GenerativeVerdict,
    VertexGenerativeClient,
};
pub use vision::{
    GoogleVisionClient, LabelAnnotation, Likelihood, SafetyAnnotation, VisionLabelPort,
    VisionSafetyPort,
};
