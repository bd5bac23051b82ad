//! Generates Swift and Kotlin bindings for `attestkit-core`.

fn main() {
    uniffi::uniffi_bindgen_main();
}
