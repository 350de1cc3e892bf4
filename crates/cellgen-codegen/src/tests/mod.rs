/*! Backend tests.
 *
 * Comparing generated IR against hand-written trees only proves the generator did what it did
 * last time. Most of these tests instead run the emitted module on a small interpreter over real
 * cells, so codecs, accessors and routers are checked by what they do to bits. Structural checks
 * remain where a property is about the shape of the output: dependency order, naming, determinism.
 */

mod vm;

mod determinism_tests;
mod lower_tests;
mod router_tests;
