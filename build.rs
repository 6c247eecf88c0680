use tonic_build::manual::{Builder, Method, Service};

// gnmi.proto's service, described by hand so no protoc is needed at
// build time. The messages live in src/proto.rs.
fn main() {
    let method = |name: &str, route: &str, input: &str, output: &str| {
        Method::builder()
            .name(name)
            .route_name(route)
            .input_type(format!("crate::proto::{input}"))
            .output_type(format!("crate::proto::{output}"))
            .codec_path("tonic::codec::ProstCodec")
    };

    let service = Service::builder()
        .name("gNMI")
        .package("gnmi")
        .method(method("capabilities", "Capabilities", "CapabilityRequest", "CapabilityResponse").build())
        .method(method("get", "Get", "GetRequest", "GetResponse").build())
        .method(method("set", "Set", "SetRequest", "SetResponse").build())
        .method(
            method("subscribe", "Subscribe", "SubscribeRequest", "SubscribeResponse")
                .client_streaming()
                .server_streaming()
                .build(),
        )
        .build();

    println!("cargo:rerun-if-changed=build.rs");
    Builder::new().compile(&[service]);
}
