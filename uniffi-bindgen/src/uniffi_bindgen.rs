//! Generates Swift and Kotlin bindings for the `credkit` library.

fn main() {
    uniffi::uniffi_bindgen_main();
}
